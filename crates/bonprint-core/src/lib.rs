// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bonprint: core types, error definitions, and configuration shared across
// all crates.

pub mod config;
pub mod error;
pub mod outcome;
pub mod types;

pub use config::{BridgeConfig, PrinterDefaults};
pub use error::BonprintError;
pub use outcome::{CommandError, ErrorKind, Outcome};
pub use types::*;

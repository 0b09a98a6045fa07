// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bonprint Print: the printer-driver side of the bridge: payload shaping,
// ESC/POS encoding, and the transports (raw TCP and Bluetooth links) that
// carry the encoded bytes to a thermal printer.

pub mod connection;
pub mod escpos;
pub mod payload;
pub mod tcp;

pub use connection::{BluetoothLink, PrinterConnection};
pub use escpos::EscPosPrinter;
pub use payload::format_payload;
pub use tcp::TcpConnection;

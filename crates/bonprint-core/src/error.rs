// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Bonprint.

use thiserror::Error;

/// Top-level error type for all internal Bonprint operations.
///
/// These never cross the method channel directly: the executor and
/// dispatcher translate them into an `outcome::CommandError` carrying a
/// machine-readable kind.
#[derive(Debug, Error)]
pub enum BonprintError {
    // -- Transport errors --
    #[error("transport error: {0}")]
    Transport(String),

    #[error("connection to {addr} timed out after {timeout_ms}ms")]
    Timeout { addr: String, timeout_ms: u64 },

    // -- Bluetooth adapter --
    #[error("Bluetooth is not available on this device")]
    BluetoothUnavailable,

    #[error("Bluetooth is disabled")]
    BluetoothDisabled,

    #[error("Bluetooth error: {0}")]
    Bluetooth(String),

    #[error("Bluetooth device not found: {0}")]
    DeviceNotFound(String),

    /// The OS refused a restricted operation even though the capability was
    /// believed granted (revoked between check and use).
    #[error("permission revoked: {0}")]
    PermissionRevoked(String),

    // -- Configuration / persistence --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Platform bridge --
    #[error("platform bridge error: {0}")]
    Bridge(String),

    #[error("feature not available on this platform")]
    PlatformUnavailable,
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BonprintError>;

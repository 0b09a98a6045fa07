// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Terminal outcomes delivered back across the method channel.
//
// Every command ends in exactly one `Outcome`. Failures carry a
// machine-readable `ErrorKind` so callers can tell a permission denial from
// a transport failure and re-prompt accordingly.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::BonprintError;

/// Machine-readable error code of a failed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidArguments,
    PrintError,
    BluetoothError,
    BluetoothDisabled,
    BluetoothNotAvailable,
    DeviceNotFound,
    PermissionDenied,
    NoActivity,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArguments => "INVALID_ARGUMENTS",
            Self::PrintError => "PRINT_ERROR",
            Self::BluetoothError => "BLUETOOTH_ERROR",
            Self::BluetoothDisabled => "BLUETOOTH_DISABLED",
            Self::BluetoothNotAvailable => "BLUETOOTH_NOT_AVAILABLE",
            Self::DeviceNotFound => "DEVICE_NOT_FOUND",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::NoActivity => "NO_ACTIVITY",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure of a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandError {
    pub code: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl CommandError {
    pub fn new(code: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn no_activity() -> Self {
        Self::new(ErrorKind::NoActivity, "Activity is not attached")
    }

    /// A print failure with the diagnostic detail map
    /// `{message, type, stackTrace}`.
    ///
    /// `prefix` names the transport ("Failed to print via TCP") and
    /// `detail_type` distinguishes the print path in the details.
    pub fn print_failure(prefix: &str, detail_type: &str, err: &BonprintError) -> Self {
        let message = format!("{prefix}: {err}");
        let details = json!({
            "message": message,
            "type": detail_type,
            "stackTrace": format!("{err:?}"),
        });
        Self::new(ErrorKind::PrintError, message).with_details(details)
    }

    /// Map adapter/device errors that have a dedicated kind. Returns `None`
    /// for errors that should fall through to the caller's generic kind.
    pub fn from_bluetooth(err: &BonprintError) -> Option<Self> {
        match err {
            BonprintError::BluetoothUnavailable => Some(Self::new(
                ErrorKind::BluetoothNotAvailable,
                "Bluetooth is not available on this device",
            )),
            BonprintError::BluetoothDisabled => {
                Some(Self::new(ErrorKind::BluetoothDisabled, "Bluetooth is disabled"))
            }
            BonprintError::DeviceNotFound(address) => Some(Self::new(
                ErrorKind::DeviceNotFound,
                format!("Bluetooth device not found: {address}"),
            )),
            BonprintError::PermissionRevoked(detail) => Some(
                Self::new(ErrorKind::PermissionDenied, "Bluetooth permission denied")
                    .with_details(Value::String(detail.clone())),
            ),
            _ => None,
        }
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// The single terminal result of a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    Success(Value),
    Error(CommandError),
    /// The method name is not part of the command surface.
    NotImplemented,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Error kind, if this is a failure.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Error(e) => Some(e.code),
            _ => None,
        }
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BonprintError, Result};
use crate::types::{PlatformProfile, PrinterSize};

/// Defaults applied when a print command omits its physical parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterDefaults {
    /// Print resolution (default 203 dpi).
    pub dpi: u32,
    /// Physical paper width (default 80 mm).
    pub width_mm: f32,
    /// Characters per line at the default font (default 42).
    pub chars_per_line: u32,
    /// Network connect timeout (default 30 s).
    pub timeout_ms: u64,
}

impl Default for PrinterDefaults {
    fn default() -> Self {
        Self {
            dpi: 203,
            width_mm: 80.0,
            chars_per_line: 42,
            timeout_ms: 30_000,
        }
    }
}

impl PrinterDefaults {
    /// Physical size used when a command names none.
    pub fn size(&self) -> PrinterSize {
        PrinterSize {
            dpi: self.dpi,
            width_mm: self.width_mm,
            chars_per_line: self.chars_per_line,
        }
    }
}

/// A serial-port Bluetooth printer bound through RFCOMM on desktop hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfcommDevice {
    pub name: String,
    pub address: String,
    /// e.g. `/dev/rfcomm0`.
    pub device_path: String,
}

/// Desktop Bluetooth adapter description. Absent means "no adapter".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesktopBluetooth {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub devices: Vec<RfcommDevice>,
}

fn enabled_by_default() -> bool {
    true
}

/// Persistent bridge settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub printer: PrinterDefaults,
    /// Bluetooth adapter for the desktop bridge.
    pub bluetooth: Option<DesktopBluetooth>,
    /// Overrides the detected platform profile (e.g. to exercise the
    /// Android permission matrix on a desktop host).
    pub platform: Option<PlatformProfile>,
}

impl BridgeConfig {
    /// Read a JSON configuration file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| BonprintError::Config(format!("{}: {e}", path.display())))
    }

    /// Load `path` if given, otherwise defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

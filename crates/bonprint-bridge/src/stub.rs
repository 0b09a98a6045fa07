// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Desktop/CI bridge.
//
// Desktop hosts have no runtime permission model, so the oracle grants
// everything. Bluetooth printers are reached through RFCOMM TTYs bound
// ahead of time (`rfcomm bind /dev/rfcomm0 <addr>`) and listed in the
// configuration; without a `bluetooth` section the adapter reports itself
// unavailable.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::sync::Arc;

use bonprint_core::config::{BridgeConfig, DesktopBluetooth, RfcommDevice};
use bonprint_core::error::{BonprintError, Result};
use bonprint_core::types::{
    BOND_BONDED, Capability, CorrelationId, DEVICE_TYPE_CLASSIC, GrantOutcome, PairedDevice,
    PlatformProfile,
};
use bonprint_print::BluetoothLink;

use crate::traits::*;

/// Class-of-device reported for configured RFCOMM printers
/// (imaging major class, printer minor bit).
const RFCOMM_PRINTER_CLASS: u32 = 0x0680;

pub struct DesktopBridge {
    profile: PlatformProfile,
    adapter: Arc<RfcommAdapter>,
}

impl DesktopBridge {
    pub fn new(config: &BridgeConfig) -> Self {
        let profile = config.platform.clone().unwrap_or_else(|| PlatformProfile {
            os_name: std::env::consts::OS.into(),
            release: std::env::consts::ARCH.into(),
            sdk_level: None,
        });
        Self {
            profile,
            adapter: Arc::new(RfcommAdapter::new(config.bluetooth.clone())),
        }
    }
}

impl PlatformBridge for DesktopBridge {
    fn platform_name(&self) -> &str {
        "Desktop"
    }

    fn profile(&self) -> PlatformProfile {
        self.profile.clone()
    }

    fn bluetooth_adapter(&self) -> Arc<dyn BluetoothAdapter> {
        self.adapter.clone()
    }

    fn permission_oracle(&self, outcomes: GrantSender) -> Result<Arc<dyn PermissionOracle>> {
        Ok(Arc::new(DesktopOracle { outcomes }))
    }
}

/// Grants every capability. A prompt (only reachable with a configured
/// platform override) is answered at once with everything granted.
pub struct DesktopOracle {
    outcomes: GrantSender,
}

impl PermissionOracle for DesktopOracle {
    fn is_granted(&self, _capability: Capability) -> bool {
        true
    }

    fn request_grant(&self, capabilities: &[Capability], correlation: CorrelationId) {
        let outcome = GrantOutcome {
            correlation,
            requested: capabilities
                .iter()
                .map(|c| c.manifest_name().to_owned())
                .collect(),
            granted: vec![true; capabilities.len()],
        };
        if self.outcomes.send(outcome).is_err() {
            tracing::warn!(%correlation, "bridge service gone; grant outcome dropped");
        }
    }
}

/// Bluetooth "adapter" backed by pre-bound RFCOMM device files.
pub struct RfcommAdapter {
    config: Option<DesktopBluetooth>,
}

impl RfcommAdapter {
    pub fn new(config: Option<DesktopBluetooth>) -> Self {
        Self { config }
    }

    fn configured(&self) -> Result<&[RfcommDevice]> {
        self.state().ensure_enabled()?;
        Ok(self
            .config
            .as_ref()
            .map(|c| c.devices.as_slice())
            .unwrap_or_default())
    }
}

impl BluetoothAdapter for RfcommAdapter {
    fn state(&self) -> AdapterState {
        match &self.config {
            None => AdapterState::Unavailable,
            Some(c) if !c.enabled => AdapterState::Disabled,
            Some(_) => AdapterState::Enabled,
        }
    }

    fn bonded_devices(&self) -> Result<Vec<PairedDevice>> {
        Ok(self
            .configured()?
            .iter()
            .map(|d| PairedDevice {
                name: Some(d.name.clone()),
                address: d.address.clone(),
                device_type: DEVICE_TYPE_CLASSIC,
                bond_state: BOND_BONDED,
                device_class: RFCOMM_PRINTER_CLASS,
            })
            .collect())
    }

    fn open_link(&self, device: &PairedDevice) -> Result<Box<dyn BluetoothLink>> {
        let entry = self
            .configured()?
            .iter()
            .find(|d| d.address.eq_ignore_ascii_case(&device.address))
            .ok_or_else(|| BonprintError::DeviceNotFound(device.address.clone()))?;

        tracing::info!(address = %entry.address, path = %entry.device_path, "opening RFCOMM link");
        let file = OpenOptions::new()
            .write(true)
            .open(&entry.device_path)
            .map_err(|e| link_error(&entry.device_path, e))?;

        Ok(Box::new(RfcommLink {
            label: format!("{} ({})", entry.name, entry.device_path),
            path: entry.device_path.clone(),
            file,
        }))
    }
}

/// Write side of a bound RFCOMM TTY.
pub struct RfcommLink {
    label: String,
    path: String,
    file: File,
}

impl BluetoothLink for RfcommLink {
    fn describe(&self) -> String {
        self.label.clone()
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.file
            .write_all(bytes)
            .map_err(|e| link_error(&self.path, e))
    }

    fn close(&mut self) -> Result<()> {
        self.file.flush().map_err(|e| link_error(&self.path, e))
    }
}

/// `EACCES` on the TTY is the desktop form of a withdrawn capability.
fn link_error(path: &str, e: io::Error) -> BonprintError {
    match e.kind() {
        io::ErrorKind::PermissionDenied => BonprintError::PermissionRevoked(format!("{path}: {e}")),
        _ => BonprintError::Bluetooth(format!("{path}: {e}")),
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scripted platform doubles shared by the unit tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use bonprint_core::error::{BonprintError, Result};
use bonprint_core::types::{
    BOND_BONDED, Capability, CorrelationId, DEVICE_TYPE_CLASSIC, GrantOutcome, PairedDevice,
};
use bonprint_print::BluetoothLink;

use crate::traits::{AdapterState, BluetoothAdapter, GrantSender, PermissionOracle};

/// Oracle with a fixed grant set that records every prompt. With a
/// `GrantSender` attached it answers each prompt immediately.
pub struct ScriptedOracle {
    granted: Mutex<HashSet<Capability>>,
    requests: Mutex<Vec<(Vec<Capability>, CorrelationId)>>,
    reply: Option<(GrantSender, bool)>,
}

impl ScriptedOracle {
    pub fn granting(granted: &[Capability]) -> Arc<Self> {
        Arc::new(Self {
            granted: Mutex::new(granted.iter().copied().collect()),
            requests: Mutex::new(Vec::new()),
            reply: None,
        })
    }

    /// Answer every prompt with `grant` for each requested capability.
    pub fn answering(granted: &[Capability], outcomes: GrantSender, grant: bool) -> Arc<Self> {
        Arc::new(Self {
            granted: Mutex::new(granted.iter().copied().collect()),
            requests: Mutex::new(Vec::new()),
            reply: Some((outcomes, grant)),
        })
    }

    pub fn requests(&self) -> Vec<(Vec<Capability>, CorrelationId)> {
        self.requests.lock().expect("requests").clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("requests").len()
    }
}

impl PermissionOracle for ScriptedOracle {
    fn is_granted(&self, capability: Capability) -> bool {
        self.granted.lock().expect("granted").contains(&capability)
    }

    fn request_grant(&self, capabilities: &[Capability], correlation: CorrelationId) {
        self.requests
            .lock()
            .expect("requests")
            .push((capabilities.to_vec(), correlation));

        if let Some((outcomes, grant)) = &self.reply {
            if *grant {
                self.granted
                    .lock()
                    .expect("granted")
                    .extend(capabilities.iter().copied());
            }
            let flags = vec![*grant; capabilities.len()];
            let _ = outcomes.send(grant_outcome(correlation, capabilities, &flags));
        }
    }
}

/// Outcome as the OS reports it: manifest names plus positional flags.
pub fn grant_outcome(
    correlation: CorrelationId,
    requested: &[Capability],
    granted: &[bool],
) -> GrantOutcome {
    GrantOutcome {
        correlation,
        requested: requested.iter().map(|c| c.manifest_name().to_owned()).collect(),
        granted: granted.to_vec(),
    }
}

/// Last link opened by a [`FakeAdapter`]: address and bytes written.
pub type WrittenJob = Arc<Mutex<Option<(String, Vec<u8>)>>>;

pub struct FakeAdapter {
    state: AdapterState,
    devices: Vec<PairedDevice>,
    written: WrittenJob,
    revoked: bool,
}

impl FakeAdapter {
    pub fn enabled(devices: Vec<PairedDevice>) -> Self {
        Self {
            state: AdapterState::Enabled,
            devices,
            written: Arc::new(Mutex::new(None)),
            revoked: false,
        }
    }

    pub fn with_state(state: AdapterState) -> Self {
        Self {
            state,
            ..Self::enabled(Vec::new())
        }
    }

    /// Links fail as if the capability was withdrawn after the grant.
    pub fn revoking(mut self) -> Self {
        self.revoked = true;
        self
    }

    pub fn written(&self) -> WrittenJob {
        Arc::clone(&self.written)
    }
}

impl BluetoothAdapter for FakeAdapter {
    fn state(&self) -> AdapterState {
        self.state
    }

    fn bonded_devices(&self) -> Result<Vec<PairedDevice>> {
        self.state.ensure_enabled()?;
        Ok(self.devices.clone())
    }

    fn open_link(&self, device: &PairedDevice) -> Result<Box<dyn BluetoothLink>> {
        if self.revoked {
            return Err(BonprintError::PermissionRevoked(
                "need android.permission.BLUETOOTH_CONNECT".into(),
            ));
        }
        Ok(Box::new(FakeLink {
            address: device.address.clone(),
            buffer: Vec::new(),
            written: Arc::clone(&self.written),
        }))
    }
}

struct FakeLink {
    address: String,
    buffer: Vec<u8>,
    written: WrittenJob,
}

impl BluetoothLink for FakeLink {
    fn describe(&self) -> String {
        self.address.clone()
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        *self.written.lock().expect("written") =
            Some((self.address.clone(), std::mem::take(&mut self.buffer)));
        Ok(())
    }
}

/// A bonded peer with the imaging (printer) device class.
pub fn printer_device(address: &str) -> PairedDevice {
    PairedDevice {
        name: Some("Receipt Printer".into()),
        address: address.into(),
        device_type: DEVICE_TYPE_CLASSIC,
        bond_state: BOND_BONDED,
        device_class: 0x0680,
    }
}

/// A bonded peer that is not a printer (audio headset class).
pub fn plain_device(address: &str) -> PairedDevice {
    PairedDevice {
        name: Some("Headset".into()),
        address: address.into(),
        device_type: DEVICE_TYPE_CLASSIC,
        bond_state: BOND_BONDED,
        device_class: 0x0404,
    }
}

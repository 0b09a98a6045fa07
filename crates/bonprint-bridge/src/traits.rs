// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for the native capabilities the
// dispatcher and executor rely on.
//
// Platforms that lack a capability (no Bluetooth radio on a CI runner, no
// runtime permission model on desktop) still implement the traits and report
// the absence through `AdapterState` or an empty capability set.

use std::sync::Arc;

use tokio::sync::mpsc;

use bonprint_core::error::{BonprintError, Result};
use bonprint_core::types::{Capability, CorrelationId, GrantOutcome, PairedDevice, PlatformProfile};
use bonprint_print::BluetoothLink;

/// Where a platform delivers grant outcomes. The bridge service drains the
/// receiving end and routes each outcome to the waiting command.
pub type GrantSender = mpsc::UnboundedSender<GrantOutcome>;

/// Runtime capability checks and prompts, backed by the attached host
/// (an Activity on Android).
pub trait PermissionOracle: Send + Sync {
    /// Whether `capability` is currently granted.
    fn is_granted(&self, capability: Capability) -> bool;

    /// Ask the user for `capabilities`. Returns immediately; the answer
    /// arrives later as a [`GrantOutcome`] tagged with `correlation`.
    fn request_grant(&self, capabilities: &[Capability], correlation: CorrelationId);
}

/// Power/presence state of the local Bluetooth adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    /// No adapter on this device.
    Unavailable,
    Disabled,
    Enabled,
}

impl AdapterState {
    /// Fail with the matching error unless the adapter is usable.
    pub fn ensure_enabled(self) -> Result<()> {
        match self {
            Self::Unavailable => Err(BonprintError::BluetoothUnavailable),
            Self::Disabled => Err(BonprintError::BluetoothDisabled),
            Self::Enabled => Ok(()),
        }
    }
}

/// Classic Bluetooth access: bonded peers and serial links to them.
///
/// All methods block; callers run them on tokio's blocking pool.
pub trait BluetoothAdapter: Send + Sync {
    fn state(&self) -> AdapterState;

    /// Peers already paired with this adapter.
    fn bonded_devices(&self) -> Result<Vec<PairedDevice>>;

    /// Look up a bonded peer by hardware address (case-insensitive).
    fn remote_device(&self, address: &str) -> Result<Option<PairedDevice>> {
        Ok(self
            .bonded_devices()?
            .into_iter()
            .find(|d| d.address.eq_ignore_ascii_case(address)))
    }

    /// Open a serial link to `device`.
    fn open_link(&self, device: &PairedDevice) -> Result<Box<dyn BluetoothLink>>;

    /// Link to the first bonded peer that advertises itself as a printer,
    /// or `None` when no such peer is paired.
    fn select_first_paired(&self) -> Result<Option<Box<dyn BluetoothLink>>> {
        self.state().ensure_enabled()?;
        match self.bonded_devices()?.into_iter().find(PairedDevice::is_printer) {
            Some(device) => {
                tracing::info!(address = %device.address, name = ?device.name, "selected paired printer");
                self.open_link(&device).map(Some)
            }
            None => Ok(None),
        }
    }
}

/// Unified bridge that groups the native capabilities of one platform.
pub trait PlatformBridge: Send + Sync {
    /// Human-readable platform name (e.g. "Android", "Desktop").
    fn platform_name(&self) -> &str;

    /// OS name, release and permission-model level.
    fn profile(&self) -> PlatformProfile;

    fn bluetooth_adapter(&self) -> Arc<dyn BluetoothAdapter>;

    /// Permission oracle for the currently attached host. Grant outcomes
    /// are pushed into `outcomes`.
    fn permission_oracle(&self, outcomes: GrantSender) -> Result<Arc<dyn PermissionOracle>>;
}

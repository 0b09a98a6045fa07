// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bonprint Bridge: capability-gated command dispatch between a host
// application and the printer executor, plus the native platform bridges
// that answer capability checks and reach Bluetooth hardware.

pub mod capabilities;
pub mod dispatcher;
pub mod executor;
pub mod response;
pub mod router;
pub mod service;
pub mod slots;
pub mod traits;

#[cfg(target_os = "android")]
pub mod android;

#[cfg(not(target_os = "android"))]
pub mod stub;

#[cfg(test)]
mod testing;

use bonprint_core::config::BridgeConfig;
use bonprint_core::error::Result;

pub use dispatcher::Dispatcher;
pub use executor::{Executor, ExecutorHandle};
pub use response::{Command, Responder};
pub use service::{BoundaryEvent, BridgeHandle, BridgeService};
pub use traits::{AdapterState, BluetoothAdapter, GrantSender, PermissionOracle, PlatformBridge};

/// The bridge implementation for the target operating system.
pub fn platform_bridge(config: &BridgeConfig) -> Result<Box<dyn PlatformBridge>> {
    #[cfg(target_os = "android")]
    {
        // Android: JNI into the ART runtime; configuration is not consulted.
        let _ = config;
        Ok(Box::new(android::AndroidBridge::new()?))
    }
    #[cfg(not(target_os = "android"))]
    {
        // Desktop/CI: RFCOMM TTYs from the configuration, no permission model.
        Ok(Box::new(stub::DesktopBridge::new(config)))
    }
}


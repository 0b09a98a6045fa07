// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Capability requirements per command and platform version.

use bonprint_core::types::{Capability, CommandName, PlatformProfile};

/// Ordered capabilities `name` needs before it may execute.
///
/// Bluetooth access maps to the legacy BLUETOOTH/BLUETOOTH_ADMIN pair below
/// the split SDK level and to BLUETOOTH_CONNECT (plus BLUETOOTH_SCAN for
/// enumeration) at or above it. Platforms without a runtime permission model
/// need nothing.
pub fn required_for(name: CommandName, profile: &PlatformProfile) -> Vec<Capability> {
    if !profile.has_permission_model() {
        return Vec::new();
    }

    match name {
        CommandName::PrintWireless | CommandName::PrintWirelessDevice => {
            if profile.split_bluetooth() {
                vec![Capability::BluetoothConnect]
            } else {
                vec![Capability::Bluetooth, Capability::BluetoothAdmin]
            }
        }
        CommandName::ListWirelessDevices => bluetooth_status_set(profile),
        CommandName::CheckGrants | CommandName::RequestGrants => status_set(profile),
        CommandName::PlatformVersion | CommandName::PrintNetwork => Vec::new(),
    }
}

/// Everything `checkPermissions` reports and `requestPermissions` asks for.
pub fn status_set(profile: &PlatformProfile) -> Vec<Capability> {
    if !profile.has_permission_model() {
        return Vec::new();
    }

    let mut set = Vec::with_capacity(6);
    if profile.legacy_storage() {
        set.push(Capability::ReadExternalStorage);
        set.push(Capability::WriteExternalStorage);
    }
    set.push(Capability::AccessFineLocation);
    set.push(Capability::AccessCoarseLocation);
    set.extend(bluetooth_status_set(profile));
    set
}

fn bluetooth_status_set(profile: &PlatformProfile) -> Vec<Capability> {
    if profile.split_bluetooth() {
        vec![Capability::BluetoothConnect, Capability::BluetoothScan]
    } else {
        vec![Capability::Bluetooth, Capability::BluetoothAdmin]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modern_printing_needs_connect_only() {
        let profile = PlatformProfile::android("14", 34);
        assert_eq!(
            required_for(CommandName::PrintWireless, &profile),
            vec![Capability::BluetoothConnect]
        );
        assert_eq!(
            required_for(CommandName::ListWirelessDevices, &profile),
            vec![Capability::BluetoothConnect, Capability::BluetoothScan]
        );
    }

    #[test]
    fn legacy_sdk_uses_legacy_names() {
        let profile = PlatformProfile::android("11", 30);
        assert_eq!(
            required_for(CommandName::PrintWirelessDevice, &profile),
            vec![Capability::Bluetooth, Capability::BluetoothAdmin]
        );
    }

    #[test]
    fn network_printing_is_unguarded() {
        let profile = PlatformProfile::android("14", 34);
        assert!(required_for(CommandName::PrintNetwork, &profile).is_empty());
        assert!(required_for(CommandName::PlatformVersion, &profile).is_empty());
    }

    #[test]
    fn status_set_drops_storage_from_sdk_33() {
        let old = status_set(&PlatformProfile::android("12", 32));
        assert_eq!(old.len(), 6);
        assert_eq!(old[0], Capability::ReadExternalStorage);

        let new = status_set(&PlatformProfile::android("13", 33));
        assert_eq!(
            new,
            vec![
                Capability::AccessFineLocation,
                Capability::AccessCoarseLocation,
                Capability::BluetoothConnect,
                Capability::BluetoothScan,
            ]
        );
    }

    #[test]
    fn platform_without_permission_model_needs_nothing() {
        let profile = PlatformProfile {
            os_name: "linux".into(),
            release: "x86_64".into(),
            sdk_level: None,
        };
        assert!(required_for(CommandName::PrintWireless, &profile).is_empty());
        assert!(status_set(&profile).is_empty());
    }
}

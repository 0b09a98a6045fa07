// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Bonprint printer bridge.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::PrinterDefaults;

/// Unique identifier for an inbound command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandId(pub Uuid);

impl CommandId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CommandId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Commands understood at the method-channel boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandName {
    /// `getPlatformVersion`: no capability, answered inline.
    PlatformVersion,
    /// `printTcp`: raw socket to a network printer.
    PrintNetwork,
    /// `printBluetooth`: first paired Bluetooth printer.
    PrintWireless,
    /// `printBluetoothDevice`: explicitly addressed Bluetooth printer.
    PrintWirelessDevice,
    /// `getBluetoothDevices`: list of already-paired peers.
    ListWirelessDevices,
    /// `checkPermissions`
    CheckGrants,
    /// `requestPermissions`
    RequestGrants,
}

impl CommandName {
    /// Parse a method-channel method name. Unknown names yield `None` and
    /// are answered with "not implemented".
    pub fn from_method(method: &str) -> Option<Self> {
        match method {
            "getPlatformVersion" => Some(Self::PlatformVersion),
            "printTcp" => Some(Self::PrintNetwork),
            "printBluetooth" => Some(Self::PrintWireless),
            "printBluetoothDevice" => Some(Self::PrintWirelessDevice),
            "getBluetoothDevices" => Some(Self::ListWirelessDevices),
            "checkPermissions" => Some(Self::CheckGrants),
            "requestPermissions" => Some(Self::RequestGrants),
            _ => None,
        }
    }

    /// Method-channel name.
    pub fn method(&self) -> &'static str {
        match self {
            Self::PlatformVersion => "getPlatformVersion",
            Self::PrintNetwork => "printTcp",
            Self::PrintWireless => "printBluetooth",
            Self::PrintWirelessDevice => "printBluetoothDevice",
            Self::ListWirelessDevices => "getBluetoothDevices",
            Self::CheckGrants => "checkPermissions",
            Self::RequestGrants => "requestPermissions",
        }
    }
}

impl std::fmt::Display for CommandName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.method())
    }
}

/// Argument bag of an inbound command.
///
/// Accessors return `None` both for absent keys and for values of the wrong
/// JSON type; callers treat the two identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Arguments(pub Map<String, Value>);

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_owned(), value.into());
        self
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }
}

/// Correlates a grant request with its later outcome.
///
/// Kept within 16 bits because Android only preserves the low 16 bits of a
/// permission request code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(pub u16);

impl CorrelationId {
    /// The id following this one, skipping zero on wrap-around.
    pub fn next(self) -> Self {
        match self.0.wrapping_add(1) {
            0 => Self(1),
            n => Self(n),
        }
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// OS-guarded capabilities the bridge may need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Legacy (pre-Android 12) Bluetooth access.
    Bluetooth,
    /// Legacy (pre-Android 12) Bluetooth administration.
    BluetoothAdmin,
    BluetoothConnect,
    BluetoothScan,
    AccessFineLocation,
    AccessCoarseLocation,
    ReadExternalStorage,
    WriteExternalStorage,
}

impl Capability {
    pub const ALL: [Capability; 8] = [
        Self::Bluetooth,
        Self::BluetoothAdmin,
        Self::BluetoothConnect,
        Self::BluetoothScan,
        Self::AccessFineLocation,
        Self::AccessCoarseLocation,
        Self::ReadExternalStorage,
        Self::WriteExternalStorage,
    ];

    /// Short name used as the key of `checkPermissions` results.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bluetooth => "BLUETOOTH",
            Self::BluetoothAdmin => "BLUETOOTH_ADMIN",
            Self::BluetoothConnect => "BLUETOOTH_CONNECT",
            Self::BluetoothScan => "BLUETOOTH_SCAN",
            Self::AccessFineLocation => "ACCESS_FINE_LOCATION",
            Self::AccessCoarseLocation => "ACCESS_COARSE_LOCATION",
            Self::ReadExternalStorage => "READ_EXTERNAL_STORAGE",
            Self::WriteExternalStorage => "WRITE_EXTERNAL_STORAGE",
        }
    }

    /// Identifier as the OS permission subsystem knows it.
    pub fn manifest_name(&self) -> &'static str {
        match self {
            Self::Bluetooth => "android.permission.BLUETOOTH",
            Self::BluetoothAdmin => "android.permission.BLUETOOTH_ADMIN",
            Self::BluetoothConnect => "android.permission.BLUETOOTH_CONNECT",
            Self::BluetoothScan => "android.permission.BLUETOOTH_SCAN",
            Self::AccessFineLocation => "android.permission.ACCESS_FINE_LOCATION",
            Self::AccessCoarseLocation => "android.permission.ACCESS_COARSE_LOCATION",
            Self::ReadExternalStorage => "android.permission.READ_EXTERNAL_STORAGE",
            Self::WriteExternalStorage => "android.permission.WRITE_EXTERNAL_STORAGE",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Android 12: Bluetooth permissions split into CONNECT / SCAN.
pub const SDK_BLUETOOTH_SPLIT: u32 = 31;

/// Android 13: legacy external-storage permissions no longer apply.
pub const SDK_SCOPED_MEDIA: u32 = 33;

/// Version/profile of the running host OS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformProfile {
    /// e.g. "Android", "Linux".
    pub os_name: String,
    /// Human release string, e.g. "14".
    pub release: String,
    /// API level of a platform with a runtime permission model. `None`
    /// means the platform guards nothing.
    pub sdk_level: Option<u32>,
}

impl PlatformProfile {
    pub fn android(release: &str, sdk_level: u32) -> Self {
        Self {
            os_name: "Android".into(),
            release: release.into(),
            sdk_level: Some(sdk_level),
        }
    }

    /// `getPlatformVersion` result, e.g. "Android 14".
    pub fn version_string(&self) -> String {
        format!("{} {}", self.os_name, self.release)
    }

    /// Whether the platform has runtime-granted capabilities at all.
    pub fn has_permission_model(&self) -> bool {
        self.sdk_level.is_some()
    }

    /// Whether Bluetooth access is split into CONNECT/SCAN.
    pub fn split_bluetooth(&self) -> bool {
        self.sdk_level.is_some_and(|l| l >= SDK_BLUETOOTH_SPLIT)
    }

    /// Whether legacy storage permissions are still meaningful.
    pub fn legacy_storage(&self) -> bool {
        self.sdk_level.is_some_and(|l| l < SDK_SCOPED_MEDIA)
    }
}

/// `BluetoothDevice.BOND_BONDED`.
pub const BOND_BONDED: i32 = 12;

/// `BluetoothDevice.DEVICE_TYPE_CLASSIC`.
pub const DEVICE_TYPE_CLASSIC: i32 = 1;

/// `BluetoothClass.Device.Major.IMAGING`.
const MAJOR_CLASS_IMAGING: u32 = 0x0600;

/// A peer already paired with the host's Bluetooth adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairedDevice {
    pub name: Option<String>,
    pub address: String,
    #[serde(rename = "type")]
    pub device_type: i32,
    #[serde(rename = "bondState")]
    pub bond_state: i32,
    /// Raw class-of-device; used to pick printers, not reported.
    #[serde(skip)]
    pub device_class: u32,
}

impl PairedDevice {
    /// Printers advertise the "imaging" major device class.
    pub fn is_printer(&self) -> bool {
        self.device_class & 0x1F00 == MAJOR_CLASS_IMAGING
    }
}

/// Physical characteristics handed to the printer driver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrinterSize {
    pub dpi: u32,
    pub width_mm: f32,
    pub chars_per_line: u32,
}

impl PrinterSize {
    /// Printable width in dots.
    pub fn width_dots(&self) -> u32 {
        (self.width_mm / 25.4 * self.dpi as f32).round() as u32
    }
}

/// Print parameters shared by every print command.
#[derive(Debug, Clone, PartialEq)]
pub struct PrintOptions {
    pub payload: String,
    pub auto_cut: bool,
    /// Accepted for compatibility; no drawer-open command is emitted.
    pub open_cashbox: bool,
    pub mm_feed_paper: i64,
    pub size: PrinterSize,
}

impl PrintOptions {
    /// Extract print options, falling back to `defaults` for the physical
    /// parameters. Returns `None` when the payload is missing.
    pub fn from_arguments(args: &Arguments, defaults: &PrinterDefaults) -> Option<Self> {
        let payload = args.str("payload")?.to_owned();
        let positive = |key: &str| args.int(key).and_then(|v| u32::try_from(v).ok());

        Some(Self {
            payload,
            auto_cut: args.bool("autoCut").unwrap_or(false),
            open_cashbox: args.bool("openCashbox").unwrap_or(false),
            mm_feed_paper: args.int("mmFeedPaper").unwrap_or(0),
            size: PrinterSize {
                dpi: positive("printerDpi").unwrap_or(defaults.dpi),
                width_mm: positive("printerWidthMM")
                    .map(|w| w as f32)
                    .unwrap_or(defaults.width_mm),
                chars_per_line: positive("printerNbrCharactersPerLine")
                    .unwrap_or(defaults.chars_per_line),
            },
        })
    }
}

/// Network printer endpoint of a `printTcp` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpTarget {
    pub ip: String,
    pub port: u16,
    pub timeout_ms: u64,
}

impl TcpTarget {
    /// Returns `None` when `ip` or `port` is missing or the port is out of range.
    pub fn from_arguments(args: &Arguments, defaults: &PrinterDefaults) -> Option<Self> {
        let ip = args.str("ip")?.to_owned();
        let port = u16::try_from(args.int("port")?).ok()?;
        let timeout_ms = args
            .int("timeout")
            .and_then(|t| u64::try_from(t).ok())
            .unwrap_or(defaults.timeout_ms);
        Some(Self {
            ip,
            port,
            timeout_ms,
        })
    }
}

/// Resolution of one grant request, as reported by the OS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantOutcome {
    pub correlation: CorrelationId,
    /// OS identifiers of the requested capabilities, in request order.
    pub requested: Vec<String>,
    /// Positional grant flags; may be shorter than `requested` (or empty)
    /// when the prompt was dismissed.
    pub granted: Vec<bool>,
}

impl GrantOutcome {
    /// Grant flag of the first requested capability; a missing flag counts
    /// as denied.
    pub fn first_granted(&self) -> bool {
        self.granted.first().copied().unwrap_or(false)
    }

    /// Capability name → granted, for every position present in both lists.
    pub fn grant_map(&self) -> Map<String, Value> {
        self.requested
            .iter()
            .zip(&self.granted)
            .map(|(name, granted)| (name.clone(), Value::Bool(*granted)))
            .collect()
    }
}

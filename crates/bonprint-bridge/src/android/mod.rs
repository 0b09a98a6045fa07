// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Android platform bridge via JNI.
//
// Requires the Android NDK and targets `aarch64-linux-android` or
// `armv7-linux-androideabi`. Capability checks and prompts go through
// AndroidX `ContextCompat`/`ActivityCompat`; Bluetooth goes through
// `android.bluetooth.BluetoothAdapter` and RFCOMM sockets.
//
// ## Architecture notes
//
// `ActivityCompat.requestPermissions` answers asynchronously through the
// Activity's `onRequestPermissionsResult`. The host Activity forwards that
// callback to `BonprintNative.onRequestPermissionsResult`, which lands in
// the exported function at the bottom of this file and is pushed into the
// bridge service's grant channel. The request code is the correlation id.

#![cfg(target_os = "android")]

use std::sync::{Arc, Mutex, OnceLock};

use jni::objects::{GlobalRef, JClass, JIntArray, JObject, JObjectArray, JString, JValue};
use jni::sys::{jint, jsize};
use jni::{JNIEnv, JavaVM};

use bonprint_core::error::{BonprintError, Result};
use bonprint_core::types::{Capability, CorrelationId, GrantOutcome, PairedDevice, PlatformProfile};
use bonprint_print::BluetoothLink;

use crate::traits::*;

/// Serial Port Profile service UUID.
const SPP_UUID: &str = "00001101-0000-1000-8000-00805F9B34FB";

/// `PackageManager.PERMISSION_GRANTED`.
const PERMISSION_GRANTED: jint = 0;

/// Local references reserved for one bridge call.
const LOCAL_FRAME_CAPACITY: i32 = 32;

/// Local references reserved while describing one bonded device.
const DEVICE_FRAME_CAPACITY: i32 = 8;

// ---------------------------------------------------------------------------
// JNI bootstrap helpers
// ---------------------------------------------------------------------------

static JAVA_VM: OnceLock<JavaVM> = OnceLock::new();

/// Where `onRequestPermissionsResult` delivers outcomes. Replaced each time
/// an oracle is created for a newly attached Activity.
static GRANT_SINK: Mutex<Option<GrantSender>> = Mutex::new(None);

/// Obtain a [`JNIEnv`] for the current thread.
///
/// The `JavaVM*` comes from `ndk_context::android_context()`, set by
/// `android_main` or `ANativeActivity_onCreate`. Threads stay attached
/// once attached; the executor's blocking pool reuses them. Callers go
/// through [`with_env`] so their local references are released.
fn jni_env() -> Result<JNIEnv<'static>> {
    let vm = match JAVA_VM.get() {
        Some(vm) => vm,
        None => {
            let ctx = ndk_context::android_context();
            // SAFETY: `ctx.vm()` returns the `JavaVM*` set by the NDK glue code.
            // The pointer is valid for the lifetime of the process.
            let vm = unsafe { JavaVM::from_raw(ctx.vm().cast()) }
                .map_err(|e| BonprintError::Bridge(format!("failed to obtain JavaVM: {e}")))?;
            JAVA_VM.get_or_init(|| vm)
        }
    };
    vm.attach_current_thread_permanently()
        .map_err(|e| BonprintError::Bridge(format!("failed to attach JNI thread: {e}")))
}

/// Run `op` on the current thread inside its own local reference frame.
///
/// Every local reference `op` creates is freed when it returns, so nothing
/// accumulates on threads that stay attached.
fn with_env<T>(op: impl FnOnce(&mut JNIEnv) -> Result<T>) -> Result<T> {
    let mut env = jni_env()?;
    in_frame(&mut env, LOCAL_FRAME_CAPACITY, op)
}

/// Run `op` inside a nested local reference frame of `env`.
fn in_frame<T>(env: &mut JNIEnv, capacity: i32, op: impl FnOnce(&mut JNIEnv) -> Result<T>) -> Result<T> {
    env.with_local_frame(capacity, |env| Ok::<_, jni::errors::Error>(op(env)))
        .map_err(|e| BonprintError::Bridge(format!("local reference frame: {e}")))?
}

/// The hosting `Activity` (or application `Context`) as a [`JObject`].
fn activity() -> Result<JObject<'static>> {
    let ptr = ndk_context::android_context().context();
    if ptr.is_null() {
        return Err(BonprintError::PlatformUnavailable);
    }
    // SAFETY: the NDK guarantees this pointer is a valid global jobject for
    // the hosting Activity.
    Ok(unsafe { JObject::from_raw(ptr.cast()) })
}

/// Map a JNI failure, turning a pending `SecurityException` into
/// [`BonprintError::PermissionRevoked`].
fn jni_err(env: &mut JNIEnv, context: &str, e: jni::errors::Error) -> BonprintError {
    if !matches!(e, jni::errors::Error::JavaException) {
        return BonprintError::Bridge(format!("{context}: {e}"));
    }

    let throwable = env.exception_occurred();
    let _ = env.exception_clear();
    let Ok(throwable) = throwable else {
        return BonprintError::Bluetooth(format!("{context}: Java exception"));
    };

    let description = env
        .call_method(&throwable, "toString", "()Ljava/lang/String;", &[])
        .and_then(|v| v.l())
        .ok()
        .and_then(|s| env.get_string(&JString::from(s)).ok().map(String::from))
        .unwrap_or_else(|| "Java exception".into());

    let revoked = env
        .is_instance_of(&throwable, "java/lang/SecurityException")
        .unwrap_or(false);
    if revoked {
        BonprintError::PermissionRevoked(format!("{context}: {description}"))
    } else {
        BonprintError::Bluetooth(format!("{context}: {description}"))
    }
}

fn read_string(env: &mut JNIEnv, obj: JObject) -> Result<Option<String>> {
    if obj.is_null() {
        return Ok(None);
    }
    let s = env
        .get_string(&JString::from(obj))
        .map_err(|e| BonprintError::Bridge(format!("get_string: {e}")))?;
    Ok(Some(s.into()))
}

// ---------------------------------------------------------------------------
// Bridge struct
// ---------------------------------------------------------------------------

/// Android implementation of the Bonprint platform bridge.
pub struct AndroidBridge {
    profile: PlatformProfile,
    adapter: Arc<AndroidBluetoothAdapter>,
}

impl AndroidBridge {
    /// Read `Build.VERSION` once; everything else is resolved lazily.
    pub fn new() -> Result<Self> {
        let (sdk, release) = with_env(|env| {
            let sdk = env
                .get_static_field("android/os/Build$VERSION", "SDK_INT", "I")
                .and_then(|v| v.i());
            let sdk = match sdk {
                Ok(sdk) => sdk,
                Err(e) => return Err(jni_err(env, "Build.VERSION.SDK_INT", e)),
            };

            let release = env
                .get_static_field("android/os/Build$VERSION", "RELEASE", "Ljava/lang/String;")
                .and_then(|v| v.l());
            let release = match release {
                Ok(obj) => read_string(env, obj)?.unwrap_or_default(),
                Err(e) => return Err(jni_err(env, "Build.VERSION.RELEASE", e)),
            };
            Ok((sdk, release))
        })?;

        tracing::info!(sdk, release = %release, "Android bridge ready");
        Ok(Self {
            profile: PlatformProfile::android(&release, sdk.max(0) as u32),
            adapter: Arc::new(AndroidBluetoothAdapter),
        })
    }
}

impl PlatformBridge for AndroidBridge {
    fn platform_name(&self) -> &str {
        "Android"
    }

    fn profile(&self) -> PlatformProfile {
        self.profile.clone()
    }

    fn bluetooth_adapter(&self) -> Arc<dyn BluetoothAdapter> {
        self.adapter.clone()
    }

    fn permission_oracle(&self, outcomes: GrantSender) -> Result<Arc<dyn PermissionOracle>> {
        activity()?;
        match GRANT_SINK.lock() {
            Ok(mut sink) => *sink = Some(outcomes),
            Err(_) => return Err(BonprintError::Bridge("grant sink poisoned".into())),
        }
        Ok(Arc::new(AndroidPermissionOracle))
    }
}

// ---------------------------------------------------------------------------
// PermissionOracle: ContextCompat / ActivityCompat
// ---------------------------------------------------------------------------

pub struct AndroidPermissionOracle;

impl AndroidPermissionOracle {
    fn check(&self, capability: Capability) -> Result<bool> {
        with_env(|env| {
            let activity = activity()?;
            let name = env
                .new_string(capability.manifest_name())
                .map_err(|e| jni_err(env, "new_string(permission)", e))?;

            let status = env
                .call_static_method(
                    "androidx/core/content/ContextCompat",
                    "checkSelfPermission",
                    "(Landroid/content/Context;Ljava/lang/String;)I",
                    &[JValue::Object(&activity), JValue::Object(&name)],
                )
                .and_then(|v| v.i());
            match status {
                Ok(status) => Ok(status == PERMISSION_GRANTED),
                Err(e) => Err(jni_err(env, "ContextCompat.checkSelfPermission", e)),
            }
        })
    }

    fn prompt(&self, capabilities: &[Capability], correlation: CorrelationId) -> Result<()> {
        with_env(|env| {
            let activity = activity()?;

            let names = env
                .new_object_array(capabilities.len() as jsize, "java/lang/String", JObject::null())
                .map_err(|e| jni_err(env, "new_object_array", e))?;
            for (i, capability) in capabilities.iter().enumerate() {
                let name = env
                    .new_string(capability.manifest_name())
                    .map_err(|e| jni_err(env, "new_string(permission)", e))?;
                env.set_object_array_element(&names, i as jsize, name)
                    .map_err(|e| jni_err(env, "set_object_array_element", e))?;
            }

            env.call_static_method(
                "androidx/core/app/ActivityCompat",
                "requestPermissions",
                "(Landroid/app/Activity;[Ljava/lang/String;I)V",
                &[
                    JValue::Object(&activity),
                    JValue::Object(&names),
                    JValue::Int(jint::from(correlation.0)),
                ],
            )
            .map_err(|e| jni_err(env, "ActivityCompat.requestPermissions", e))?;
            Ok(())
        })
    }
}

impl PermissionOracle for AndroidPermissionOracle {
    fn is_granted(&self, capability: Capability) -> bool {
        self.check(capability).unwrap_or_else(|e| {
            tracing::warn!(%capability, error = %e, "permission check failed; treating as missing");
            false
        })
    }

    fn request_grant(&self, capabilities: &[Capability], correlation: CorrelationId) {
        tracing::info!(%correlation, ?capabilities, "Android: requesting permissions");
        if let Err(e) = self.prompt(capabilities, correlation) {
            // Report a dismissed prompt so the waiting command is rejected
            // instead of parked forever.
            tracing::error!(error = %e, "Android: permission prompt failed");
            deliver(GrantOutcome {
                correlation,
                requested: capabilities
                    .iter()
                    .map(|c| c.manifest_name().to_owned())
                    .collect(),
                granted: Vec::new(),
            });
        }
    }
}

fn deliver(outcome: GrantOutcome) {
    let sink = GRANT_SINK.lock().ok().and_then(|s| s.clone());
    match sink {
        Some(sink) if sink.send(outcome).is_ok() => {}
        _ => tracing::warn!("Android: no bridge service to receive grant outcome"),
    }
}

/// `BonprintNative.onRequestPermissionsResult(int, String[], int[])`.
///
/// Called by the host Activity from its own `onRequestPermissionsResult`.
#[unsafe(no_mangle)]
pub extern "system" fn Java_dev_bonprint_BonprintNative_onRequestPermissionsResult<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    request_code: jint,
    permissions: JObjectArray<'local>,
    grant_results: JIntArray<'local>,
) {
    let Ok(correlation) = u16::try_from(request_code & 0xFFFF) else {
        return;
    };

    let mut requested = Vec::new();
    let count = env.get_array_length(&permissions).unwrap_or(0);
    for i in 0..count {
        let Ok(element) = env.get_object_array_element(&permissions, i) else {
            break;
        };
        match read_string(&mut env, element) {
            Ok(Some(name)) => requested.push(name),
            _ => break,
        }
    }

    let mut flags = vec![0; env.get_array_length(&grant_results).unwrap_or(0).max(0) as usize];
    if env.get_int_array_region(&grant_results, 0, &mut flags).is_err() {
        flags.clear();
    }

    deliver(GrantOutcome {
        correlation: CorrelationId(correlation),
        requested,
        granted: flags.into_iter().map(|f| f == PERMISSION_GRANTED).collect(),
    });
}

// ---------------------------------------------------------------------------
// BluetoothAdapter: android.bluetooth
// ---------------------------------------------------------------------------

pub struct AndroidBluetoothAdapter;

/// `BluetoothAdapter.getDefaultAdapter()`, or `None` without a radio.
fn default_adapter<'local>(env: &mut JNIEnv<'local>) -> Result<Option<JObject<'local>>> {
    let adapter = env
        .call_static_method(
            "android/bluetooth/BluetoothAdapter",
            "getDefaultAdapter",
            "()Landroid/bluetooth/BluetoothAdapter;",
            &[],
        )
        .and_then(|v| v.l());
    match adapter {
        Ok(obj) if obj.is_null() => Ok(None),
        Ok(obj) => Ok(Some(obj)),
        Err(e) => Err(jni_err(env, "BluetoothAdapter.getDefaultAdapter", e)),
    }
}

fn enabled_adapter<'local>(env: &mut JNIEnv<'local>) -> Result<JObject<'local>> {
    let adapter = default_adapter(env)?.ok_or(BonprintError::BluetoothUnavailable)?;
    let enabled = env
        .call_method(&adapter, "isEnabled", "()Z", &[])
        .and_then(|v| v.z());
    match enabled {
        Ok(true) => Ok(adapter),
        Ok(false) => Err(BonprintError::BluetoothDisabled),
        Err(e) => Err(jni_err(env, "BluetoothAdapter.isEnabled", e)),
    }
}

fn call_int(env: &mut JNIEnv, obj: &JObject, method: &str) -> Result<i32> {
    match env.call_method(obj, method, "()I", &[]).and_then(|v| v.i()) {
        Ok(v) => Ok(v),
        Err(e) => Err(jni_err(env, method, e)),
    }
}

fn call_string(env: &mut JNIEnv, obj: &JObject, method: &str) -> Result<Option<String>> {
    match env
        .call_method(obj, method, "()Ljava/lang/String;", &[])
        .and_then(|v| v.l())
    {
        Ok(s) => read_string(env, s),
        Err(e) => Err(jni_err(env, method, e)),
    }
}

fn describe_device(env: &mut JNIEnv, device: &JObject) -> Result<PairedDevice> {
    let name = call_string(env, device, "getName")?;
    let address = call_string(env, device, "getAddress")?.unwrap_or_default();
    let device_type = call_int(env, device, "getType")?;
    let bond_state = call_int(env, device, "getBondState")?;

    let class = env
        .call_method(device, "getBluetoothClass", "()Landroid/bluetooth/BluetoothClass;", &[])
        .and_then(|v| v.l());
    let device_class = match class {
        Ok(c) if c.is_null() => 0,
        Ok(c) => call_int(env, &c, "getDeviceClass")? as u32,
        Err(e) => return Err(jni_err(env, "getBluetoothClass", e)),
    };

    Ok(PairedDevice {
        name,
        address,
        device_type,
        bond_state,
        device_class,
    })
}

/// Cancel discovery, connect `socket` and return its output stream.
fn connect_socket<'local>(
    env: &mut JNIEnv<'local>,
    adapter: &JObject,
    socket: &JObject,
) -> Result<JObject<'local>> {
    // Discovery slows RFCOMM connects down considerably.
    env.call_method(adapter, "cancelDiscovery", "()Z", &[])
        .map_err(|e| jni_err(env, "cancelDiscovery", e))?;
    env.call_method(socket, "connect", "()V", &[])
        .map_err(|e| jni_err(env, "BluetoothSocket.connect", e))?;
    env.call_method(socket, "getOutputStream", "()Ljava/io/OutputStream;", &[])
        .and_then(|v| v.l())
        .map_err(|e| jni_err(env, "getOutputStream", e))
}

/// `BluetoothSocket.close()`, discarding any exception it throws.
fn close_quietly(env: &mut JNIEnv, socket: &JObject) {
    if env.call_method(socket, "close", "()V", &[]).is_err() {
        let _ = env.exception_clear();
    }
}

impl BluetoothAdapter for AndroidBluetoothAdapter {
    fn state(&self) -> AdapterState {
        with_env(|env| {
            Ok(match enabled_adapter(env) {
                Ok(_) => AdapterState::Enabled,
                Err(BonprintError::BluetoothDisabled) => AdapterState::Disabled,
                Err(_) => AdapterState::Unavailable,
            })
        })
        .unwrap_or(AdapterState::Unavailable)
    }

    fn bonded_devices(&self) -> Result<Vec<PairedDevice>> {
        let devices = with_env(|env| {
            let adapter = enabled_adapter(env)?;

            let bonded = env
                .call_method(&adapter, "getBondedDevices", "()Ljava/util/Set;", &[])
                .and_then(|v| v.l());
            let bonded = match bonded {
                Ok(set) if set.is_null() => return Ok(Vec::new()),
                Ok(set) => set,
                Err(e) => return Err(jni_err(env, "getBondedDevices", e)),
            };

            let array = env
                .call_method(&bonded, "toArray", "()[Ljava/lang/Object;", &[])
                .and_then(|v| v.l());
            let array = match array {
                Ok(a) => JObjectArray::from(a),
                Err(e) => return Err(jni_err(env, "Set.toArray", e)),
            };

            let len = env
                .get_array_length(&array)
                .map_err(|e| jni_err(env, "get_array_length", e))?;
            let mut devices = Vec::with_capacity(len.max(0) as usize);
            for i in 0..len {
                let device = in_frame(env, DEVICE_FRAME_CAPACITY, |env| {
                    let device = env
                        .get_object_array_element(&array, i)
                        .map_err(|e| jni_err(env, "get_object_array_element", e))?;
                    describe_device(env, &device)
                })?;
                devices.push(device);
            }
            Ok(devices)
        })?;
        tracing::info!(count = devices.len(), "Android: bonded devices");
        Ok(devices)
    }

    fn open_link(&self, device: &PairedDevice) -> Result<Box<dyn BluetoothLink>> {
        let (socket, stream) = with_env(|env| {
            let adapter = enabled_adapter(env)?;

            let j_address = env
                .new_string(&device.address)
                .map_err(|e| jni_err(env, "new_string(address)", e))?;
            let remote = env
                .call_method(
                    &adapter,
                    "getRemoteDevice",
                    "(Ljava/lang/String;)Landroid/bluetooth/BluetoothDevice;",
                    &[JValue::Object(&j_address)],
                )
                .and_then(|v| v.l())
                .map_err(|e| jni_err(env, "getRemoteDevice", e))?;

            let j_uuid = env
                .new_string(SPP_UUID)
                .map_err(|e| jni_err(env, "new_string(uuid)", e))?;
            let uuid = env
                .call_static_method(
                    "java/util/UUID",
                    "fromString",
                    "(Ljava/lang/String;)Ljava/util/UUID;",
                    &[JValue::Object(&j_uuid)],
                )
                .and_then(|v| v.l())
                .map_err(|e| jni_err(env, "UUID.fromString", e))?;

            let socket = env
                .call_method(
                    &remote,
                    "createRfcommSocketToServiceRecord",
                    "(Ljava/util/UUID;)Landroid/bluetooth/BluetoothSocket;",
                    &[JValue::Object(&uuid)],
                )
                .and_then(|v| v.l())
                .map_err(|e| jni_err(env, "createRfcommSocketToServiceRecord", e))?;

            tracing::info!(address = %device.address, "Android: connecting RFCOMM socket");
            let refs = connect_socket(env, &adapter, &socket)
                .and_then(|stream| {
                    let socket_ref = env
                        .new_global_ref(&socket)
                        .map_err(|e| jni_err(env, "new_global_ref(socket)", e))?;
                    let stream_ref = env
                        .new_global_ref(stream)
                        .map_err(|e| jni_err(env, "new_global_ref(stream)", e))?;
                    Ok((socket_ref, stream_ref))
                });
            if refs.is_err() {
                close_quietly(env, &socket);
            }
            refs
        })?;

        Ok(Box::new(AndroidRfcommLink {
            label: device.name.clone().unwrap_or_else(|| device.address.clone()),
            socket,
            stream,
            closed: false,
        }))
    }
}

/// Connected `BluetoothSocket` and its output stream. The socket is closed
/// on drop if [`BluetoothLink::close`] never ran.
pub struct AndroidRfcommLink {
    label: String,
    socket: GlobalRef,
    stream: GlobalRef,
    closed: bool,
}

impl BluetoothLink for AndroidRfcommLink {
    fn describe(&self) -> String {
        self.label.clone()
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        with_env(|env| {
            let array = env
                .byte_array_from_slice(bytes)
                .map_err(|e| jni_err(env, "byte_array_from_slice", e))?;
            env.call_method(self.stream.as_obj(), "write", "([B)V", &[JValue::Object(&array)])
                .map_err(|e| jni_err(env, "OutputStream.write", e))?;
            env.call_method(self.stream.as_obj(), "flush", "()V", &[])
                .map_err(|e| jni_err(env, "OutputStream.flush", e))?;
            Ok(())
        })
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        with_env(|env| {
            env.call_method(self.socket.as_obj(), "close", "()V", &[])
                .map_err(|e| jni_err(env, "BluetoothSocket.close", e))?;
            Ok(())
        })
    }
}

impl Drop for AndroidRfcommLink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(link = %self.label, error = %e, "Android: closing RFCOMM socket on drop failed");
        }
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The bridge service task.
//
// Method calls, host lifecycle events and grant outcomes arrive from
// different threads (the host's UI thread, JNI callbacks, the stdin reader)
// and are funnelled through channels into one task. That task alone owns
// the dispatcher, so the pending registers are never shared.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use bonprint_core::outcome::Outcome;
use bonprint_core::types::{Arguments, GrantOutcome};

use crate::dispatcher::Dispatcher;
use crate::response::Responder;
use crate::traits::{GrantSender, PermissionOracle};

/// Something that happened at the host boundary.
pub enum BoundaryEvent {
    Call {
        method: String,
        arguments: Arguments,
        responder: Responder,
    },
    AttachHost(Arc<dyn PermissionOracle>),
    DetachHost,
}

/// Cheap, cloneable front door to a running [`BridgeService`].
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    events: mpsc::UnboundedSender<BoundaryEvent>,
}

impl BridgeHandle {
    /// Submit a method call. The receiver yields exactly one outcome, or a
    /// `RecvError` if the command was superseded or the service stopped.
    pub fn call(&self, method: &str, arguments: Arguments) -> oneshot::Receiver<Outcome> {
        let (responder, rx) = Responder::channel();
        self.send(BoundaryEvent::Call {
            method: method.to_owned(),
            arguments,
            responder,
        });
        rx
    }

    pub fn attach_host(&self, oracle: Arc<dyn PermissionOracle>) {
        self.send(BoundaryEvent::AttachHost(oracle));
    }

    pub fn detach_host(&self) {
        self.send(BoundaryEvent::DetachHost);
    }

    fn send(&self, event: BoundaryEvent) {
        if self.events.send(event).is_err() {
            warn!("bridge service has stopped; event dropped");
        }
    }
}

pub struct BridgeService {
    dispatcher: Dispatcher,
    events: mpsc::UnboundedReceiver<BoundaryEvent>,
    grants: mpsc::UnboundedReceiver<GrantOutcome>,
}

impl BridgeService {
    /// Wrap `dispatcher`. Returns the service, a handle for callers, and the
    /// sender platform oracles push grant outcomes into.
    pub fn new(dispatcher: Dispatcher) -> (Self, BridgeHandle, GrantSender) {
        let (events_tx, events) = mpsc::unbounded_channel();
        let (grants_tx, grants) = mpsc::unbounded_channel();
        (
            Self {
                dispatcher,
                events,
                grants,
            },
            BridgeHandle { events: events_tx },
            grants_tx,
        )
    }

    /// Process events until every [`BridgeHandle`] is dropped.
    pub async fn run(mut self) {
        info!(platform = %self.dispatcher.profile().version_string(), "bridge service started");
        loop {
            tokio::select! {
                biased;
                Some(outcome) = self.grants.recv() => {
                    if !self.dispatcher.on_grant_outcome(outcome) {
                        debug!("ignored grant outcome");
                    }
                }
                event = self.events.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
            }
        }
        info!(pending = self.dispatcher.slots().len(), "bridge service stopped");
    }

    fn handle(&mut self, event: BoundaryEvent) {
        match event {
            BoundaryEvent::Call {
                method,
                arguments,
                responder,
            } => self.dispatcher.dispatch_call(&method, arguments, responder),
            BoundaryEvent::AttachHost(oracle) => self.dispatcher.attach_host(oracle),
            BoundaryEvent::DetachHost => self.dispatcher.detach_host(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::{Value, json};

    use bonprint_core::config::PrinterDefaults;
    use bonprint_core::outcome::ErrorKind;
    use bonprint_core::types::{Capability, PlatformProfile};

    use crate::executor::Executor;
    use crate::testing::{FakeAdapter, ScriptedOracle, printer_device};
    use crate::traits::AdapterState;

    fn start(adapter: FakeAdapter) -> (BridgeHandle, GrantSender) {
        let executor = Executor::new(Arc::new(adapter), PrinterDefaults::default()).spawn();
        let dispatcher = Dispatcher::new(PlatformProfile::android("14", 34), executor);
        let (service, handle, grants) = BridgeService::new(dispatcher);
        tokio::spawn(service.run());
        (handle, grants)
    }

    async fn outcome(rx: oneshot::Receiver<Outcome>) -> Outcome {
        tokio::time::timeout(Duration::from_secs(5), rx)
            .await
            .expect("answered in time")
            .expect("not superseded")
    }

    #[tokio::test]
    async fn granted_prompt_resumes_bluetooth_print_end_to_end() {
        let adapter = FakeAdapter::enabled(vec![printer_device("66:77:88:99:AA:BB")]);
        let written = adapter.written();
        let (handle, grants) = start(adapter);

        let oracle = ScriptedOracle::answering(&[], grants, true);
        handle.attach_host(oracle.clone());

        let rx = handle.call("printBluetooth", Arguments::new().with("payload", "Hi"));
        assert_eq!(outcome(rx).await, Outcome::Success(Value::Bool(true)));
        assert_eq!(oracle.request_count(), 1);
        assert!(written.lock().expect("sink").is_some());

        // Granted now, so no second prompt.
        let rx = handle.call("printBluetooth", Arguments::new().with("payload", "Hi"));
        assert!(outcome(rx).await.is_success());
        assert_eq!(oracle.request_count(), 1);
    }

    #[tokio::test]
    async fn denied_prompt_fails_device_listing() {
        let (handle, grants) = start(FakeAdapter::enabled(vec![]));
        handle.attach_host(ScriptedOracle::answering(&[], grants, false));

        let rx = handle.call("getBluetoothDevices", Arguments::new());
        let Outcome::Error(err) = outcome(rx).await else {
            panic!("expected error");
        };
        assert_eq!(err.code, ErrorKind::PermissionDenied);
        assert_eq!(err.message, "Bluetooth permission is required to get device list");
    }

    #[tokio::test]
    async fn disabled_adapter_is_reported_after_grant() {
        let (handle, grants) = start(FakeAdapter::with_state(AdapterState::Disabled));
        handle.attach_host(ScriptedOracle::answering(
            &[Capability::BluetoothConnect, Capability::BluetoothScan],
            grants,
            true,
        ));

        let rx = handle.call("getBluetoothDevices", Arguments::new());
        assert_eq!(outcome(rx).await.error_kind(), Some(ErrorKind::BluetoothDisabled));
    }

    #[tokio::test]
    async fn explicit_request_round_trip() {
        let (handle, grants) = start(FakeAdapter::enabled(vec![]));
        handle.attach_host(ScriptedOracle::answering(
            &[Capability::AccessFineLocation, Capability::AccessCoarseLocation],
            grants,
            true,
        ));

        let rx = handle.call("requestPermissions", Arguments::new());
        assert_eq!(
            outcome(rx).await,
            Outcome::Success(json!({
                "android.permission.BLUETOOTH_CONNECT": true,
                "android.permission.BLUETOOTH_SCAN": true,
            }))
        );

        let rx = handle.call("requestPermissions", Arguments::new());
        assert_eq!(
            outcome(rx).await,
            Outcome::Success(json!({ "status": "All permissions already granted" }))
        );
    }

    #[tokio::test]
    async fn detached_host_rejects_gated_commands() {
        let (handle, grants) = start(FakeAdapter::enabled(vec![]));
        handle.attach_host(ScriptedOracle::answering(&Capability::ALL, grants, true));
        handle.detach_host();

        let rx = handle.call("checkPermissions", Arguments::new());
        assert_eq!(outcome(rx).await.error_kind(), Some(ErrorKind::NoActivity));

        let rx = handle.call("getPlatformVersion", Arguments::new());
        assert_eq!(outcome(rx).await, Outcome::Success(json!("Android 14")));
    }
}

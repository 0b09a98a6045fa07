// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Background worker that performs the actual printer I/O.
//
// Commands reach the worker only after every capability they need has been
// granted. One worker drains one FIFO queue, so print jobs never interleave
// on the wire.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};

use bonprint_core::config::PrinterDefaults;
use bonprint_core::error::{BonprintError, Result};
use bonprint_core::outcome::{CommandError, ErrorKind};
use bonprint_core::types::{Arguments, CommandName, PrintOptions, TcpTarget};
use bonprint_print::{format_payload, BluetoothLink, EscPosPrinter, PrinterConnection, TcpConnection};

use crate::response::Command;
use crate::traits::BluetoothAdapter;

/// Queue side of the worker. Cloning shares the same queue.
#[derive(Debug, Clone)]
pub struct ExecutorHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl ExecutorHandle {
    /// A handle plus the raw queue it feeds, for callers that drive the
    /// receiving side themselves.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Command>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue `command` for execution. Never blocks.
    pub fn submit(&self, command: Command) {
        if let Err(mpsc::error::SendError(command)) = self.tx.send(command) {
            error!(command = %command.id, name = %command.name, "executor is gone, failing command");
            command.responder.error(CommandError::new(
                ErrorKind::PrintError,
                "Print executor is not running",
            ));
        }
    }
}

/// The worker's state: the Bluetooth adapter and printer defaults.
#[derive(Clone)]
pub struct Executor {
    bluetooth: Arc<dyn BluetoothAdapter>,
    defaults: PrinterDefaults,
}

impl Executor {
    pub fn new(bluetooth: Arc<dyn BluetoothAdapter>, defaults: PrinterDefaults) -> Self {
        Self {
            bluetooth,
            defaults,
        }
    }

    /// Start the worker on the current runtime.
    pub fn spawn(self) -> ExecutorHandle {
        let (handle, rx) = ExecutorHandle::channel();
        tokio::spawn(self.run(rx));
        handle
    }

    /// Execute queued commands one at a time until every handle is dropped.
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<Command>) {
        info!("print executor started");
        while let Some(command) = rx.recv().await {
            self.execute(command).await;
        }
        info!("print executor stopped");
    }

    /// Run one command to completion and answer it.
    #[instrument(skip_all, fields(command = %command.id, name = %command.name))]
    pub async fn execute(&self, command: Command) {
        let Command {
            name,
            arguments,
            responder,
            ..
        } = command;

        let result = match name {
            CommandName::PrintNetwork => self.print_tcp(&arguments).await,
            CommandName::PrintWireless => self.print_bluetooth(&arguments).await,
            CommandName::PrintWirelessDevice => self.print_bluetooth_device(&arguments).await,
            CommandName::ListWirelessDevices => self.list_devices().await,
            other => {
                warn!(name = %other, "command has no executor path");
                responder.not_implemented();
                return;
            }
        };
        responder.complete(result);
    }

    async fn print_tcp(&self, args: &Arguments) -> std::result::Result<Value, CommandError> {
        let (Some(target), Some(options)) = (
            TcpTarget::from_arguments(args, &self.defaults),
            PrintOptions::from_arguments(args, &self.defaults),
        ) else {
            warn!("printTcp called without ip, port or payload");
            return Err(CommandError::new(
                ErrorKind::InvalidArguments,
                "IP, port, and payload are required",
            ));
        };

        let job = async {
            let conn = TcpConnection::connect(
                &target.ip,
                target.port,
                Duration::from_millis(target.timeout_ms),
            )
            .await?;
            EscPosPrinter::new(PrinterConnection::Tcp(conn), options.size)
                .print_formatted_text_and_cut(&format_payload(&options))
                .await
        };

        job.await.map_err(|e| {
            error!(error = %e, ip = %target.ip, port = target.port, "TCP print failed");
            CommandError::print_failure("Failed to print via TCP", "PRINT_ERROR", &e)
        })?;

        info!(ip = %target.ip, port = target.port, "printed via TCP");
        Ok(Value::Bool(true))
    }

    async fn print_bluetooth(&self, args: &Arguments) -> std::result::Result<Value, CommandError> {
        const PREFIX: &str = "Failed to print via Bluetooth";
        const DETAIL: &str = "BLUETOOTH_PRINT_ERROR";

        let Some(options) = PrintOptions::from_arguments(args, &self.defaults) else {
            warn!("printBluetooth called without payload");
            return Err(CommandError::new(ErrorKind::InvalidArguments, "Payload is required"));
        };

        let adapter = Arc::clone(&self.bluetooth);
        let link = blocking(move || adapter.select_first_paired())
            .await
            .map_err(|e| bluetooth_print_failure(PREFIX, DETAIL, &e))?;

        let Some(link) = link else {
            warn!("no paired Bluetooth printer");
            return Err(CommandError::new(
                ErrorKind::BluetoothError,
                "No paired Bluetooth printer found. Please pair a printer first.",
            ));
        };

        print_over_link(link, &options)
            .await
            .map_err(|e| bluetooth_print_failure(PREFIX, DETAIL, &e))?;
        Ok(Value::Bool(true))
    }

    async fn print_bluetooth_device(
        &self,
        args: &Arguments,
    ) -> std::result::Result<Value, CommandError> {
        const PREFIX: &str = "Failed to print to Bluetooth device";
        const DETAIL: &str = "BLUETOOTH_DEVICE_PRINT_ERROR";

        let (Some(address), Some(options)) = (
            args.str("address").map(str::to_owned),
            PrintOptions::from_arguments(args, &self.defaults),
        ) else {
            warn!("printBluetoothDevice called without address or payload");
            return Err(CommandError::new(
                ErrorKind::InvalidArguments,
                "Address and payload are required",
            ));
        };

        let adapter = Arc::clone(&self.bluetooth);
        let link = blocking(move || {
            adapter.state().ensure_enabled()?;
            let device = adapter
                .remote_device(&address)?
                .ok_or_else(|| BonprintError::DeviceNotFound(address.clone()))?;
            info!(address = %device.address, name = ?device.name, "connecting to Bluetooth device");
            adapter.open_link(&device)
        })
        .await
        .map_err(|e| bluetooth_print_failure(PREFIX, DETAIL, &e))?;

        print_over_link(link, &options)
            .await
            .map_err(|e| bluetooth_print_failure(PREFIX, DETAIL, &e))?;
        Ok(Value::Bool(true))
    }

    async fn list_devices(&self) -> std::result::Result<Value, CommandError> {
        let adapter = Arc::clone(&self.bluetooth);
        let devices = blocking(move || {
            adapter.state().ensure_enabled()?;
            adapter.bonded_devices()
        })
        .await
        .map_err(|e| {
            error!(error = %e, "failed to list Bluetooth devices");
            CommandError::from_bluetooth(&e).unwrap_or_else(|| {
                CommandError::new(
                    ErrorKind::BluetoothError,
                    format!("Failed to get Bluetooth devices: {e}"),
                )
                .with_details(Value::String(format!("{e:?}")))
            })
        })?;

        info!(count = devices.len(), "listed paired Bluetooth devices");
        serde_json::to_value(devices).map_err(|e| {
            CommandError::new(
                ErrorKind::BluetoothError,
                format!("Failed to get Bluetooth devices: {e}"),
            )
        })
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

async fn print_over_link(link: Box<dyn BluetoothLink>, options: &PrintOptions) -> Result<()> {
    EscPosPrinter::new(PrinterConnection::Bluetooth(link), options.size)
        .print_formatted_text_and_cut(&format_payload(options))
        .await
}

/// Run blocking adapter calls off the async workers.
async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| BonprintError::Bridge(format!("blocking Bluetooth task: {e}")))?
}

/// Adapter and revocation errors keep their dedicated kinds; anything
/// else is a print failure for the given path.
fn bluetooth_print_failure(prefix: &str, detail_type: &str, err: &BonprintError) -> CommandError {
    error!(error = %err, "{prefix}");
    CommandError::from_bluetooth(err)
        .unwrap_or_else(|| CommandError::print_failure(prefix, detail_type, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    use bonprint_core::outcome::Outcome;
    use bonprint_print::payload::{MAX_FEED_MM, MM_PER_FEED_LINE};

    use crate::testing::{FakeAdapter, plain_device, printer_device};
    use crate::traits::AdapterState;

    fn executor(adapter: FakeAdapter) -> Executor {
        Executor::new(Arc::new(adapter), PrinterDefaults::default())
    }

    async fn run(executor: &Executor, name: CommandName, args: Arguments) -> Outcome {
        let (command, rx) = Command::with_channel(name, args);
        executor.execute(command).await;
        rx.await.expect("command answered")
    }

    fn bluetooth_args() -> Arguments {
        Arguments::new().with("payload", "[C]Danke").with("autoCut", true)
    }

    #[tokio::test]
    async fn print_tcp_requires_ip_port_and_payload() {
        let exec = executor(FakeAdapter::enabled(vec![]));
        let outcome = run(
            &exec,
            CommandName::PrintNetwork,
            Arguments::new().with("ip", "10.0.0.5").with("payload", "X"),
        )
        .await;
        let Outcome::Error(err) = outcome else { panic!("expected error") };
        assert_eq!(err.code, ErrorKind::InvalidArguments);
        assert_eq!(err.message, "IP, port, and payload are required");
    }

    #[tokio::test]
    async fn print_tcp_delivers_formatted_job() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.expect("read");
            received
        });

        let exec = executor(FakeAdapter::enabled(vec![]));
        let outcome = run(
            &exec,
            CommandName::PrintNetwork,
            Arguments::new()
                .with("ip", "127.0.0.1")
                .with("port", port)
                .with("payload", "X")
                .with("mmFeedPaper", 9),
        )
        .await;
        assert_eq!(outcome, Outcome::Success(Value::Bool(true)));

        let received = server.await.expect("server task");
        let expected = bonprint_print::escpos::encode_formatted_text_and_cut(
            "X\n\n",
            &PrinterDefaults::default().size(),
        );
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn print_tcp_clamps_huge_paper_feed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.expect("read");
            received
        });

        let exec = executor(FakeAdapter::enabled(vec![]));
        let outcome = run(
            &exec,
            CommandName::PrintNetwork,
            Arguments::new()
                .with("ip", "127.0.0.1")
                .with("port", port)
                .with("payload", "X")
                .with("mmFeedPaper", i64::MAX),
        )
        .await;
        assert_eq!(outcome, Outcome::Success(Value::Bool(true)));

        let feed = "\n".repeat((MAX_FEED_MM / MM_PER_FEED_LINE) as usize);
        let received = server.await.expect("server task");
        let expected = bonprint_print::escpos::encode_formatted_text_and_cut(
            &format!("X{feed}"),
            &PrinterDefaults::default().size(),
        );
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn print_tcp_reports_unreachable_printer() {
        // Bind then drop to get a port nobody listens on.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
            listener.local_addr().expect("addr").port()
        };

        let exec = executor(FakeAdapter::enabled(vec![]));
        let outcome = run(
            &exec,
            CommandName::PrintNetwork,
            Arguments::new()
                .with("ip", "127.0.0.1")
                .with("port", port)
                .with("payload", "X")
                .with("timeout", 500),
        )
        .await;

        let Outcome::Error(err) = outcome else { panic!("expected error") };
        assert_eq!(err.code, ErrorKind::PrintError);
        assert!(err.message.starts_with("Failed to print via TCP"));
        let details = err.details.expect("details");
        assert_eq!(details["type"], "PRINT_ERROR");
        assert_eq!(details["message"], Value::String(err.message.clone()));
        assert!(details["stackTrace"].is_string());
    }

    #[tokio::test]
    async fn print_bluetooth_without_paired_printer() {
        let exec = executor(FakeAdapter::enabled(vec![plain_device("00:11:22:33:44:55")]));
        let outcome = run(&exec, CommandName::PrintWireless, bluetooth_args()).await;
        let Outcome::Error(err) = outcome else { panic!("expected error") };
        assert_eq!(err.code, ErrorKind::BluetoothError);
        assert_eq!(
            err.message,
            "No paired Bluetooth printer found. Please pair a printer first."
        );
    }

    #[tokio::test]
    async fn print_bluetooth_reports_adapter_state_before_searching() {
        let exec = executor(FakeAdapter::with_state(AdapterState::Disabled));
        let outcome = run(&exec, CommandName::PrintWireless, bluetooth_args()).await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::BluetoothDisabled));

        let exec = executor(FakeAdapter::with_state(AdapterState::Unavailable));
        let outcome = run(&exec, CommandName::PrintWireless, bluetooth_args()).await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::BluetoothNotAvailable));
    }

    #[tokio::test]
    async fn print_bluetooth_writes_to_first_printer() {
        let adapter = FakeAdapter::enabled(vec![
            plain_device("00:11:22:33:44:55"),
            printer_device("66:77:88:99:AA:BB"),
        ]);
        let written = adapter.written();
        let exec = executor(adapter);

        let outcome = run(&exec, CommandName::PrintWireless, bluetooth_args()).await;
        assert_eq!(outcome, Outcome::Success(Value::Bool(true)));

        let (address, bytes) = written.lock().expect("sink").clone().expect("link opened");
        assert_eq!(address, "66:77:88:99:AA:BB");
        let expected = bonprint_print::escpos::encode_formatted_text_and_cut(
            "[C]Danke\n",
            &PrinterDefaults::default().size(),
        );
        assert_eq!(bytes, expected);
    }

    #[tokio::test]
    async fn print_bluetooth_requires_payload() {
        let exec = executor(FakeAdapter::enabled(vec![printer_device("66:77:88:99:AA:BB")]));
        let outcome = run(&exec, CommandName::PrintWireless, Arguments::new()).await;
        let Outcome::Error(err) = outcome else { panic!("expected error") };
        assert_eq!(err.code, ErrorKind::InvalidArguments);
        assert_eq!(err.message, "Payload is required");
    }

    #[tokio::test]
    async fn print_bluetooth_device_maps_adapter_state() {
        let args = bluetooth_args().with("address", "66:77:88:99:AA:BB");

        let exec = executor(FakeAdapter::with_state(AdapterState::Disabled));
        let outcome = run(&exec, CommandName::PrintWirelessDevice, args.clone()).await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::BluetoothDisabled));

        let exec = executor(FakeAdapter::with_state(AdapterState::Unavailable));
        let outcome = run(&exec, CommandName::PrintWirelessDevice, args).await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::BluetoothNotAvailable));
    }

    #[tokio::test]
    async fn print_bluetooth_device_unknown_address() {
        let exec = executor(FakeAdapter::enabled(vec![printer_device("66:77:88:99:AA:BB")]));
        let outcome = run(
            &exec,
            CommandName::PrintWirelessDevice,
            bluetooth_args().with("address", "DE:AD:BE:EF:00:01"),
        )
        .await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::DeviceNotFound));
    }

    #[tokio::test]
    async fn print_bluetooth_device_addresses_any_bonded_peer() {
        let adapter = FakeAdapter::enabled(vec![plain_device("00:11:22:33:44:55")]);
        let written = adapter.written();
        let exec = executor(adapter);

        let outcome = run(
            &exec,
            CommandName::PrintWirelessDevice,
            bluetooth_args().with("address", "00:11:22:33:44:55"),
        )
        .await;
        assert!(outcome.is_success());
        let (address, _) = written.lock().expect("sink").clone().expect("link opened");
        assert_eq!(address, "00:11:22:33:44:55");
    }

    #[tokio::test]
    async fn print_bluetooth_device_requires_address() {
        let exec = executor(FakeAdapter::enabled(vec![]));
        let outcome = run(&exec, CommandName::PrintWirelessDevice, bluetooth_args()).await;
        let Outcome::Error(err) = outcome else { panic!("expected error") };
        assert_eq!(err.code, ErrorKind::InvalidArguments);
        assert_eq!(err.message, "Address and payload are required");
    }

    #[tokio::test]
    async fn revoked_capability_mid_execution_is_permission_denied() {
        let adapter = FakeAdapter::enabled(vec![printer_device("66:77:88:99:AA:BB")]).revoking();
        let exec = executor(adapter);
        let outcome = run(&exec, CommandName::PrintWireless, bluetooth_args()).await;
        let Outcome::Error(err) = outcome else { panic!("expected error") };
        assert_eq!(err.code, ErrorKind::PermissionDenied);
        assert!(err.details.is_some());
    }

    #[tokio::test]
    async fn list_devices_reports_paired_peers() {
        let exec = executor(FakeAdapter::enabled(vec![printer_device("66:77:88:99:AA:BB")]));
        let Outcome::Success(value) = run(&exec, CommandName::ListWirelessDevices, Arguments::new()).await
        else {
            panic!("expected success");
        };
        let devices = value.as_array().expect("array");
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0]["address"], "66:77:88:99:AA:BB");
        assert_eq!(devices[0]["name"], "Receipt Printer");
        assert_eq!(devices[0]["type"], 1);
        assert_eq!(devices[0]["bondState"], 12);
    }

    #[tokio::test]
    async fn list_devices_with_nothing_paired_is_empty() {
        let exec = executor(FakeAdapter::enabled(vec![]));
        let outcome = run(&exec, CommandName::ListWirelessDevices, Arguments::new()).await;
        assert_eq!(outcome, Outcome::Success(Value::Array(vec![])));
    }

    #[tokio::test]
    async fn list_devices_with_adapter_off() {
        let exec = executor(FakeAdapter::with_state(AdapterState::Disabled));
        let outcome = run(&exec, CommandName::ListWirelessDevices, Arguments::new()).await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::BluetoothDisabled));
    }

    #[tokio::test]
    async fn worker_answers_queued_commands_in_order() {
        let exec = executor(FakeAdapter::enabled(vec![]));
        let handle = exec.spawn();

        let (first, first_rx) = Command::with_channel(CommandName::ListWirelessDevices, Arguments::new());
        let (second, second_rx) = Command::with_channel(CommandName::PrintNetwork, Arguments::new());
        handle.submit(first);
        handle.submit(second);

        assert!(first_rx.await.expect("first answered").is_success());
        assert_eq!(
            second_rx.await.expect("second answered").error_kind(),
            Some(ErrorKind::InvalidArguments)
        );
    }

    #[test]
    fn submit_to_stopped_worker_fails_command() {
        let (handle, rx) = ExecutorHandle::channel();
        drop(rx);
        let (command, mut out) = Command::with_channel(CommandName::PrintNetwork, Arguments::new());
        handle.submit(command);
        assert_eq!(
            out.try_recv().expect("answered").error_kind(),
            Some(ErrorKind::PrintError)
        );
    }
}

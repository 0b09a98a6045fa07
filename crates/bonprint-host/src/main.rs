// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bonprint host process.
//
// Entry point. Initialises logging, loads configuration, wires the platform
// bridge to the dispatcher and executor, then serves the JSON-lines method
// channel on stdin/stdout until stdin closes. Logs go to stderr.

mod channel;

use std::path::PathBuf;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use bonprint_bridge::{
    BridgeHandle, BridgeService, Dispatcher, Executor, GrantSender, PlatformBridge,
    platform_bridge,
};
use bonprint_core::config::BridgeConfig;
use bonprint_core::error::Result;
use bonprint_core::outcome::{CommandError, ErrorKind, Outcome};

use channel::{ATTACH_METHOD, DETACH_METHOD, Request, Response};

/// Environment variable naming the JSON configuration file.
const CONFIG_ENV: &str = "BONPRINT_CONFIG";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Bonprint host starting");

    if let Err(e) = serve().await {
        error!(error = %e, "host stopped with an error");
        std::process::exit(1);
    }
}

/// The bridge plus what is needed to bind a host to it again later.
struct Host {
    bridge: Box<dyn PlatformBridge>,
    grants: GrantSender,
    handle: BridgeHandle,
}

impl Host {
    fn attach(&self) -> Result<()> {
        let oracle = self.bridge.permission_oracle(self.grants.clone())?;
        self.handle.attach_host(oracle);
        Ok(())
    }

    /// Answer lifecycle calls here; forward everything else to the bridge
    /// and reply once its outcome arrives.
    fn dispatch(&self, request: Request, out: &mpsc::UnboundedSender<Response>) {
        debug!(id = request.id, method = %request.method, "request");
        match request.method.as_str() {
            ATTACH_METHOD => {
                let outcome = match self.attach() {
                    Ok(()) => Outcome::Success(Value::Bool(true)),
                    Err(e) => Outcome::Error(CommandError::new(ErrorKind::NoActivity, e.to_string())),
                };
                send(out, Response::new(request.id, outcome));
            }
            DETACH_METHOD => {
                self.handle.detach_host();
                send(out, Response::new(request.id, Outcome::Success(Value::Bool(true))));
            }
            method => {
                let rx = self.handle.call(method, request.arguments);
                let out = out.clone();
                let id = request.id;
                tokio::spawn(async move {
                    match rx.await {
                        Ok(outcome) => send(&out, Response::new(id, outcome)),
                        Err(_) => warn!(id, "command was superseded; no response will be sent"),
                    }
                });
            }
        }
    }
}

fn send(out: &mpsc::UnboundedSender<Response>, response: Response) {
    if out.send(response).is_err() {
        warn!("response writer has stopped");
    }
}

async fn serve() -> Result<()> {
    let config_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    let config = BridgeConfig::load_or_default(config_path.as_deref())?;
    info!(config = ?config_path, "configuration loaded");

    let bridge = platform_bridge(&config)?;
    info!(platform = bridge.platform_name(), version = %bridge.profile().version_string(), "platform bridge ready");

    let executor = Executor::new(bridge.bluetooth_adapter(), config.printer.clone()).spawn();
    let dispatcher = Dispatcher::new(bridge.profile(), executor);
    let (service, handle, grants) = BridgeService::new(dispatcher);
    let service_task = tokio::spawn(service.run());

    let host = Host {
        bridge,
        grants,
        handle,
    };
    if let Err(e) = host.attach() {
        warn!(error = %e, "no host context yet; gated commands will fail until attached");
    }

    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_responses(out_rx));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match channel::parse_request(&line) {
            Ok(request) => host.dispatch(request, &out_tx),
            Err(response) => {
                warn!(line = %line, "malformed request");
                send(&out_tx, response);
            }
        }
    }

    info!("stdin closed; draining in-flight commands");
    // Dropping the last handle stops the service, which drops the dispatcher
    // and with it the executor queue. In-flight commands still complete.
    drop(host);
    drop(out_tx);
    if let Err(e) = service_task.await {
        error!(error = %e, "bridge service task failed");
    }
    match writer.await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "response writer task failed");
            Ok(())
        }
    }
}

async fn write_responses(mut rx: mpsc::UnboundedReceiver<Response>) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(response) = rx.recv().await {
        let line = channel::encode_response(&response)?;
        stdout.write_all(line.as_bytes()).await?;
        stdout.flush().await?;
    }
    Ok(())
}

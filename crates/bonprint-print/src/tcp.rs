// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw TCP printer transport (JetDirect-style, usually port 9100).
//
// Thermal receipt printers on the network accept ESC/POS bytes on a bare
// socket: no negotiation, no job tracking, just write and close.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info};

use bonprint_core::error::{BonprintError, Result};

/// Write granularity for progress logging.
const CHUNK_SIZE: usize = 8192;

/// An open socket to a network printer.
#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
    addr: String,
    timeout: Duration,
}

impl TcpConnection {
    /// Connect to `ip:port`, giving up after `timeout`.
    pub async fn connect(ip: &str, port: u16, timeout: Duration) -> Result<Self> {
        let addr = format!("{ip}:{port}");
        info!(addr = %addr, timeout_ms = timeout.as_millis() as u64, "connecting via raw TCP");

        let stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| BonprintError::Timeout {
                addr: addr.clone(),
                timeout_ms: timeout.as_millis() as u64,
            })?
            .map_err(|e| BonprintError::Transport(format!("connect to {addr}: {e}")))?;

        Ok(Self {
            stream,
            addr,
            timeout,
        })
    }

    /// Remote address this connection was opened to.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Send all bytes, flush, and shut the write half down.
    ///
    /// The whole transfer is bounded by the connect timeout so a printer
    /// that stops reading cannot stall the worker forever.
    pub async fn send(mut self, bytes: &[u8]) -> Result<()> {
        let timeout = self.timeout;
        let addr = self.addr.clone();
        tokio::time::timeout(timeout, self.write_all(bytes))
            .await
            .map_err(|_| BonprintError::Timeout {
                addr,
                timeout_ms: timeout.as_millis() as u64,
            })?
    }

    async fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let mut sent = 0usize;
        for chunk in bytes.chunks(CHUNK_SIZE) {
            self.stream.write_all(chunk).await.map_err(|e| {
                BonprintError::Transport(format!("send to {} failed at byte {sent}: {e}", self.addr))
            })?;
            sent += chunk.len();
            debug!(sent, total = bytes.len(), "raw TCP progress");
        }

        self.stream
            .flush()
            .await
            .map_err(|e| BonprintError::Transport(format!("flush {}: {e}", self.addr)))?;
        self.stream
            .shutdown()
            .await
            .map_err(|e| BonprintError::Transport(format!("shutdown {}: {e}", self.addr)))?;

        info!(addr = %self.addr, total = bytes.len(), "raw TCP data sent");
        Ok(())
    }
}

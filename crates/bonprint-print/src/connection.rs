// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transport handed to the printer driver.

use tracing::debug;

use bonprint_core::error::{BonprintError, Result};

use crate::tcp::TcpConnection;

/// A connected Bluetooth serial (SPP/RFCOMM) link to a printer.
///
/// Platform bridges implement this over their native socket API. Calls are
/// blocking; the driver runs them on tokio's blocking pool.
pub trait BluetoothLink: Send {
    /// Short description for logs (device name or address).
    fn describe(&self) -> String;

    /// Write the whole buffer to the printer.
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Close the link. Called once per link, whether or not the write
    /// succeeded.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Transport a driver instance writes to.
pub enum PrinterConnection {
    Tcp(TcpConnection),
    Bluetooth(Box<dyn BluetoothLink>),
}

impl PrinterConnection {
    /// Deliver `bytes` and release the transport.
    pub async fn send(self, bytes: Vec<u8>) -> Result<()> {
        match self {
            Self::Tcp(conn) => conn.send(&bytes).await,
            Self::Bluetooth(mut link) => {
                debug!(link = %link.describe(), bytes = bytes.len(), "writing to Bluetooth link");
                tokio::task::spawn_blocking(move || {
                    let written = link.write_all(&bytes);
                    let closed = link.close();
                    // The write error, if any, wins over the close error.
                    written.and(closed)
                })
                .await
                .map_err(|e| BonprintError::Transport(format!("Bluetooth writer task: {e}")))?
            }
        }
    }
}

impl std::fmt::Debug for PrinterConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tcp(conn) => f.debug_tuple("Tcp").field(&conn.addr()).finish(),
            Self::Bluetooth(link) => f.debug_tuple("Bluetooth").field(&link.describe()).finish(),
        }
    }
}

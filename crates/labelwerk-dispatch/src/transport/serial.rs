// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Serial transport: Bluetooth SPP via a bound RFCOMM node, or a plain
// RS-232 port. Fire-and-forget — label printers on a serial link do not
// reliably echo status, so none is awaited.
//
// Bluetooth setup is the OS's job: pair the printer and bind it to an
// RFCOMM device (`rfcomm bind 0 <addr>` → /dev/rfcomm0), then hand that
// node to the dispatcher as the address.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serial2_tokio::SerialPort;
use tracing::{debug, info};

use labelwerk_core::error::{LabelwerkError, Result};

use super::{Transport, connect_error};

/// Serial channel to a printer behind a tty/RFCOMM device node.
pub struct SerialTransport {
    port: Option<SerialPort>,
    path: String,
}

impl SerialTransport {
    /// Open the device node in raw 8N1 mode at the given baud rate.
    pub fn open(path: &str, baud: u32) -> Result<Self> {
        if path.is_empty() {
            return Err(LabelwerkError::Address("empty serial device path".into()));
        }
        let port =
            SerialPort::open(path, baud).map_err(|e| connect_error("open serial", path, e))?;
        info!(path, baud, "serial port opened");
        Ok(Self {
            port: Some(port),
            path: path.to_string(),
        })
    }

    fn port(&self) -> Result<&SerialPort> {
        self.port
            .as_ref()
            .ok_or_else(|| LabelwerkError::Transport(format!("{}: port closed", self.path)))
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        let port = self.port()?;
        port.write_all(chunk)
            .await
            .map_err(|e| LabelwerkError::Transport(format!("write to {}: {}", self.path, e)))?;
        debug!(path = %self.path, bytes = chunk.len(), "chunk written");
        Ok(())
    }

    async fn read_status(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        let port = self.port()?;
        let mut buf = [0u8; 64];
        let n = tokio::time::timeout(timeout, port.read(&mut buf))
            .await
            .map_err(|_| LabelwerkError::StatusTimeout(timeout))?
            .map_err(|e| {
                LabelwerkError::Transport(format!("status read from {}: {}", self.path, e))
            })?;
        Ok(buf[..n].to_vec())
    }

    async fn is_alive(&mut self) -> bool {
        // The node vanishes when the adapter unbinds or the cable goes.
        self.port.is_some() && Path::new(&self.path).exists()
    }

    async fn close(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            info!(path = %self.path, "serial port closed");
        }
        Ok(())
    }
}

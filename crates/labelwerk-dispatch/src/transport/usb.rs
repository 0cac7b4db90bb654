// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// USB transport via the kernel printer-class driver.
//
// The usblp driver exposes a USB printer as a character device
// (/dev/usb/lp0); writing the device node streams bytes to the printer's
// bulk-out endpoint. Enumeration and permissions belong to the OS layer,
// the dispatcher just receives the node path in the device identity.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

use labelwerk_core::error::{LabelwerkError, Result};

use super::{Transport, connect_error};

/// Channel to a usblp character device.
pub struct UsbTransport {
    file: Option<File>,
    path: String,
}

impl UsbTransport {
    /// Open the printer device node read/write.
    pub async fn open(path: &str) -> Result<Self> {
        if path.is_empty() {
            return Err(LabelwerkError::Address("empty USB device path".into()));
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .await
            .map_err(|e| connect_error("open USB device", path, e))?;
        info!(path, "USB printer device opened");
        Ok(Self {
            file: Some(file),
            path: path.to_string(),
        })
    }

    fn file_mut(&mut self) -> Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| LabelwerkError::Transport(format!("{}: device closed", self.path)))
    }
}

#[async_trait]
impl Transport for UsbTransport {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        let path = self.path.clone();
        let file = self.file_mut()?;
        file.write_all(chunk)
            .await
            .map_err(|e| LabelwerkError::Transport(format!("write to {}: {}", path, e)))?;
        file.flush()
            .await
            .map_err(|e| LabelwerkError::Transport(format!("flush to {}: {}", path, e)))?;
        debug!(path = %path, bytes = chunk.len(), "chunk written");
        Ok(())
    }

    async fn read_status(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        let path = self.path.clone();
        let file = self.file_mut()?;
        let mut buf = [0u8; 64];
        let n = tokio::time::timeout(timeout, file.read(&mut buf))
            .await
            .map_err(|_| LabelwerkError::StatusTimeout(timeout))?
            .map_err(|e| LabelwerkError::Transport(format!("status read from {}: {}", path, e)))?;
        Ok(buf[..n].to_vec())
    }

    async fn is_alive(&mut self) -> bool {
        // Unplugging removes the node; a stale handle would fail writes.
        self.file.is_some() && Path::new(&self.path).exists()
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()
                .await
                .map_err(|e| LabelwerkError::Transport(format!("flush to {}: {}", self.path, e)))?;
            info!(path = %self.path, "USB printer device closed");
        }
        Ok(())
    }
}

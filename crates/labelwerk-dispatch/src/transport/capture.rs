// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Debug capture transport.
//
// Writes the exact encoded byte stream to a local file instead of a
// physical device — protocol-conformance testing without hardware. The
// file receives chunks in write order, so it always equals the stream a
// real printer would have seen.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use labelwerk_core::error::{LabelwerkError, Result};

use super::Transport;

/// File-backed transport standing in for a printer.
pub struct CaptureTransport {
    file: Option<File>,
    path: PathBuf,
}

impl CaptureTransport {
    /// Create (truncate) the capture file.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.as_os_str().is_empty() {
            return Err(LabelwerkError::Address("empty capture path".into()));
        }
        let file = File::create(&path).await.map_err(|e| {
            LabelwerkError::Transport(format!("create capture file {}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), "capture file opened");
        Ok(Self {
            file: Some(file),
            path,
        })
    }

    /// Where the stream is being captured.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Transport for CaptureTransport {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        let path = self.path.clone();
        let file = self.file.as_mut().ok_or_else(|| {
            LabelwerkError::Transport(format!("{}: capture closed", path.display()))
        })?;
        file.write_all(chunk).await.map_err(|e| {
            LabelwerkError::Transport(format!("write capture {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), bytes = chunk.len(), "chunk captured");
        Ok(())
    }

    async fn read_status(&mut self, _timeout: Duration) -> Result<Vec<u8>> {
        Err(LabelwerkError::Transport(
            "capture transport has no status channel".into(),
        ))
    }

    async fn is_alive(&mut self) -> bool {
        self.file.is_some()
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().await.map_err(|e| {
                LabelwerkError::Transport(format!("flush capture {}: {}", self.path.display(), e))
            })?;
            info!(path = %self.path.display(), "capture file closed");
        }
        Ok(())
    }
}

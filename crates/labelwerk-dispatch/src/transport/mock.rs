// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scripted transport for session and dispatcher tests.
//
// One shared script drives every transport the factory hands out, and
// one shared log records what the "device" saw: connect attempts, every
// chunk in arrival order, status reads, closes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use labelwerk_core::config::SessionConfig;
use labelwerk_core::error::{LabelwerkError, Result};
use labelwerk_core::types::DeviceIdentity;

use super::{Transport, TransportFactory};

/// What the scripted device does when asked for status.
#[derive(Debug, Clone)]
pub enum StatusScript {
    /// Fire-and-forget device.
    None,
    /// Echo these bytes.
    Reply(Vec<u8>),
    /// Never answer — the read times out.
    Silent,
}

#[derive(Debug)]
pub struct MockState {
    /// Fail this many connects before letting one succeed.
    pub fail_connects: u32,
    /// Fail the write of the chunk with this global zero-based index,
    /// once. Cleared after it fires so a retry sails through.
    pub fail_chunk_once: Option<usize>,
    pub status: StatusScript,
    /// Slow every chunk write down, to hold the session Busy.
    pub write_delay: Duration,
    // -- observations --
    pub connects: u32,
    pub chunks: Vec<Vec<u8>>,
    pub status_reads: u32,
    pub closes: u32,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            fail_connects: 0,
            fail_chunk_once: None,
            status: StatusScript::None,
            write_delay: Duration::ZERO,
            connects: 0,
            chunks: Vec::new(),
            status_reads: 0,
            closes: 0,
        }
    }
}

/// Factory handing out transports that share one script + log.
#[derive(Clone)]
pub struct MockFactory {
    pub state: Arc<Mutex<MockState>>,
}

impl MockFactory {
    pub fn new(state: MockState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn connects(&self) -> u32 {
        self.state.lock().unwrap().connects
    }

    pub fn chunks(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().chunks.clone()
    }

    pub fn closes(&self) -> u32 {
        self.state.lock().unwrap().closes
    }
}

#[async_trait]
impl TransportFactory for MockFactory {
    async fn connect(
        &self,
        identity: &DeviceIdentity,
        _config: &SessionConfig,
    ) -> Result<Box<dyn Transport>> {
        let mut state = self.state.lock().unwrap();
        state.connects += 1;
        if state.fail_connects > 0 {
            state.fail_connects -= 1;
            return Err(LabelwerkError::Transport(format!(
                "{}: scripted connect refusal",
                identity.address
            )));
        }
        Ok(Box::new(MockTransport {
            state: Arc::clone(&self.state),
            open: true,
        }))
    }
}

pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    open: bool,
}

#[async_trait]
impl Transport for MockTransport {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            let index = state.chunks.len();
            if state.fail_chunk_once == Some(index) {
                state.fail_chunk_once = None;
                return Err(LabelwerkError::Transport(format!(
                    "scripted write failure at chunk {index}"
                )));
            }
            state.chunks.push(chunk.to_vec());
            state.write_delay
        };
        if delay > Duration::ZERO {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn read_status(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        let script = {
            let mut state = self.state.lock().unwrap();
            state.status_reads += 1;
            state.status.clone()
        };
        match script {
            StatusScript::Reply(bytes) => Ok(bytes),
            StatusScript::Silent => Err(LabelwerkError::StatusTimeout(timeout)),
            StatusScript::None => Ok(Vec::new()),
        }
    }

    fn expects_status(&self) -> bool {
        !matches!(self.state.lock().unwrap().status, StatusScript::None)
    }

    async fn is_alive(&mut self) -> bool {
        self.open
    }

    async fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            self.state.lock().unwrap().closes += 1;
        }
        Ok(())
    }
}

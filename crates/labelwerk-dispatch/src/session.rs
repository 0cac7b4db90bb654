// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Device session: one printer, at most one transport, at most one
// in-flight job.
//
// State machine: Idle → Connecting → Busy → Idle on the success loop;
// any state → Faulted on an unrecoverable transport error. A Faulted
// session retries the connection on the next job until the reconnect
// ceiling, then fails fast without touching I/O until an explicit
// reset. Closed is terminal.
//
// Encoding failures are client defects, not device faults: the session
// returns to Idle. A lost status reply is ambiguous (the label most
// likely printed) and also leaves the session Idle — only the outcome
// tag tells the caller the acknowledgment never came.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use labelwerk_core::config::SessionConfig;
use labelwerk_core::error::{LabelwerkError, Result};
use labelwerk_core::types::{DeviceIdentity, JobId, PrintJob, SessionState, TransportKind};

use crate::capabilities::CapabilityProfile;
use crate::encoder::{EncodedJob, chunk_payload, encode};
use crate::transport::{Transport, TransportFactory};

/// What a successful submit hands back to the dispatcher.
#[derive(Debug, Clone, Default)]
pub struct SubmitReceipt {
    /// Raw status bytes, when the transport reports them.
    pub status: Option<Vec<u8>>,
    /// Capture file location, in capture or tee mode.
    pub capture_path: Option<PathBuf>,
}

/// Session for exactly one device identity.
pub struct DeviceSession {
    identity: DeviceIdentity,
    profile: CapabilityProfile,
    config: SessionConfig,
    factory: Arc<dyn TransportFactory>,
    state: SessionState,
    transport: Option<Box<dyn Transport>>,
    /// Consecutive failed reconnects since the last good connection.
    reconnect_failures: u32,
    last_used: Instant,
}

impl DeviceSession {
    pub fn new(
        identity: DeviceIdentity,
        profile: CapabilityProfile,
        config: SessionConfig,
        factory: Arc<dyn TransportFactory>,
    ) -> Self {
        Self {
            identity,
            profile,
            config,
            factory,
            state: SessionState::Idle,
            transport: None,
            reconnect_failures: 0,
            last_used: Instant::now(),
        }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Time since the last job touched this session.
    pub fn idle_for(&self) -> Duration {
        self.last_used.elapsed()
    }

    /// Run one structured job through encode → write → status.
    #[instrument(skip(self, job), fields(job_id = %job.id, device = %self.identity))]
    pub async fn submit(&mut self, job: &PrintJob) -> Result<SubmitReceipt> {
        self.begin().await?;

        let encoded = match encode(job, &self.profile) {
            Ok(encoded) => encoded,
            Err(e) => return Err(self.client_defect(e)),
        };
        self.deliver(job.id, &encoded).await
    }

    /// Run a raw, pre-encoded command-language payload. Bytes pass
    /// through unmodified; only line-boundary chunking is applied.
    #[instrument(skip(self, payload), fields(job_id = %job_id, device = %self.identity))]
    pub async fn submit_payload(&mut self, job_id: JobId, payload: &[u8]) -> Result<SubmitReceipt> {
        self.begin().await?;

        let encoded = match chunk_payload(payload, self.profile.buffer_bytes) {
            Ok(encoded) => encoded,
            Err(e) => return Err(self.client_defect(e)),
        };
        self.deliver(job_id, &encoded).await
    }

    /// State checks, then Connecting → Busy with a live transport.
    async fn begin(&mut self) -> Result<()> {
        match self.state {
            SessionState::Closed => return Err(LabelwerkError::SessionClosed),
            SessionState::Busy | SessionState::Connecting => {
                return Err(LabelwerkError::DeviceBusy);
            }
            SessionState::Faulted if self.reconnect_failures >= self.config.reconnect_ceiling => {
                return Err(LabelwerkError::Transport(format!(
                    "{}: faulted after {} failed reconnects; reset required",
                    self.identity, self.reconnect_failures
                )));
            }
            SessionState::Idle | SessionState::Faulted => {}
        }

        self.state = SessionState::Connecting;
        if let Err(e) = self.ensure_transport().await {
            self.reconnect_failures += 1;
            self.state = SessionState::Faulted;
            warn!(
                failures = self.reconnect_failures,
                error = %e,
                "connect failed"
            );
            return Err(e);
        }
        self.reconnect_failures = 0;
        self.state = SessionState::Busy;
        Ok(())
    }

    /// A bad payload leaves the device untouched and the session Idle.
    fn client_defect(&mut self, e: LabelwerkError) -> LabelwerkError {
        self.state = SessionState::Idle;
        self.last_used = Instant::now();
        e
    }

    /// Capture tee, sequential chunk writes, optional status read.
    async fn deliver(&mut self, job_id: JobId, encoded: &EncodedJob) -> Result<SubmitReceipt> {
        debug!(
            chunks = encoded.chunk_count(),
            bytes = encoded.total_bytes(),
            "job encoded"
        );
        let capture_path = self.capture(job_id, encoded).await;
        self.write_chunks(encoded).await?;

        let mut receipt = SubmitReceipt {
            status: None,
            capture_path,
        };
        if let Some(timeout) = self.config.status_timeout {
            receipt.status = self.await_status(timeout).await?;
        }

        self.state = SessionState::Idle;
        self.last_used = Instant::now();
        info!(status = receipt.status.is_some(), "job delivered");
        Ok(receipt)
    }

    /// Reuse the open transport when it still looks live, else dial.
    async fn ensure_transport(&mut self) -> Result<()> {
        if let Some(transport) = self.transport.as_mut() {
            if transport.is_alive().await {
                return Ok(());
            }
            debug!("stale transport discarded");
            let _ = transport.close().await;
            self.transport = None;
        }

        let transport = tokio::time::timeout(
            self.config.connect_timeout,
            self.factory.connect(&self.identity, &self.config),
        )
        .await
        .map_err(|_| {
            LabelwerkError::Transport(format!(
                "{}: connect timed out after {:?}",
                self.identity, self.config.connect_timeout
            ))
        })??;

        self.transport = Some(transport);
        Ok(())
    }

    /// Sequential chunk writes. The first failure aborts the rest and
    /// faults the session — a retry re-sends the whole job from chunk 1,
    /// because the printer's partial-receive state is unknown.
    async fn write_chunks(&mut self, encoded: &EncodedJob) -> Result<()> {
        let total = encoded.chunk_count();
        for (index, chunk) in encoded.chunks().iter().enumerate() {
            let transport = self
                .transport
                .as_mut()
                .ok_or_else(|| LabelwerkError::Transport("transport lost mid-job".into()))?;
            if let Err(e) = transport.write_chunk(chunk).await {
                self.fault().await;
                return Err(LabelwerkError::Transport(format!(
                    "chunk {}/{}: {}",
                    index + 1,
                    total,
                    e
                )));
            }
        }
        Ok(())
    }

    /// Read the device's acknowledgment, when this transport has one.
    ///
    /// A timeout leaves the session Idle: the print very likely finished
    /// and only the acknowledgment was lost. A hard read error faults.
    async fn await_status(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| LabelwerkError::Transport("transport lost mid-job".into()))?;
        if !transport.expects_status() {
            return Ok(None);
        }
        match transport.read_status(timeout).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(LabelwerkError::StatusTimeout(t)) => {
                self.state = SessionState::Idle;
                self.last_used = Instant::now();
                warn!(timeout = ?t, "no status reply; print outcome ambiguous");
                Err(LabelwerkError::StatusTimeout(t))
            }
            Err(e) => {
                self.fault().await;
                Err(e)
            }
        }
    }

    /// Tee the encoded stream to the capture directory, when configured.
    /// Capture identities report their own target file instead.
    async fn capture(&self, job_id: JobId, encoded: &EncodedJob) -> Option<PathBuf> {
        if self.identity.kind == TransportKind::Capture {
            return Some(PathBuf::from(&self.identity.address));
        }
        let dir = self.config.capture_dir.as_ref()?;
        let path = dir.join(format!("{}.tspl", job_id));
        match tokio::fs::write(&path, encoded.to_bytes()).await {
            Ok(()) => Some(path),
            Err(e) => {
                // Capture is a debugging aid; delivery continues without it.
                warn!(path = %path.display(), error = %e, "capture tee failed");
                None
            }
        }
    }

    /// Drop the transport and mark the session Faulted.
    async fn fault(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            let _ = transport.close().await;
        }
        self.state = SessionState::Faulted;
    }

    /// Fault after an overall-timeout abandonment: the in-flight I/O was
    /// cancelled, so the channel's true state is unknown.
    pub async fn fault_abandoned(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        warn!(device = %self.identity, "dispatch abandoned; faulting session");
        self.fault().await;
    }

    /// Clear a Faulted session so the next job dials again.
    pub fn reset(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.reconnect_failures = 0;
        self.transport = None;
        self.state = SessionState::Idle;
    }

    /// Terminal shutdown. Idempotent.
    pub async fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            let _ = transport.close().await;
        }
        if self.state != SessionState::Closed {
            info!(device = %self.identity, "session closed");
            self.state = SessionState::Closed;
        }
    }
}

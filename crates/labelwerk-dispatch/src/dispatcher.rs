// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Dispatcher: the public entry point of the engine.
//
// Owns the process-wide DeviceIdentity → DeviceSession map. The map lock
// is scoped to lookup/insert only and is never held during I/O; each
// session's own mutex is the per-device exclusion unit. Contention on
// one device is fail-fast: a concurrent caller observes DeviceBusy
// (with one optional re-check after a backoff) instead of queueing, so
// per-device completion order equals submission order by construction.
//
// Every dispatch resolves to exactly one DispatchResult. Transport
// errors and timeouts are retried with exponential backoff, re-sending
// the whole job from chunk 1; encoding failures are returned as-is.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use labelwerk_core::config::{DispatchPolicy, SessionConfig};
use labelwerk_core::error::LabelwerkError;
use labelwerk_core::types::{
    DeviceIdentity, DispatchOutcome, DispatchResult, JobId, PrintJob, SessionState,
};

use crate::capabilities::CapabilityProfile;
use crate::retry::{classify_error, compute_backoff, is_retryable};
use crate::session::{DeviceSession, SubmitReceipt};
use crate::transport::{SystemTransports, TransportFactory};

/// The job body a dispatch carries: structured commands or a raw
/// pre-encoded payload.
#[derive(Clone, Copy)]
enum Work<'a> {
    Structured(&'a PrintJob),
    Raw(&'a [u8]),
}

/// Label print dispatcher with per-device sessions.
pub struct Dispatcher {
    sessions: Mutex<HashMap<DeviceIdentity, Arc<Mutex<DeviceSession>>>>,
    factory: Arc<dyn TransportFactory>,
    profile: CapabilityProfile,
    config: SessionConfig,
    closed: AtomicBool,
}

impl Dispatcher {
    /// Dispatcher over the real system transports.
    pub fn new(profile: CapabilityProfile, config: SessionConfig) -> Self {
        Self::with_factory(profile, config, Arc::new(SystemTransports))
    }

    /// Dispatcher over a custom transport factory (tests, simulators).
    pub fn with_factory(
        profile: CapabilityProfile,
        config: SessionConfig,
        factory: Arc<dyn TransportFactory>,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            factory,
            profile,
            config,
            closed: AtomicBool::new(false),
        }
    }

    /// Deliver a structured print job to its target device.
    #[instrument(skip(self, job, policy), fields(job_id = %job.id, device = %job.target))]
    pub async fn dispatch(&self, job: PrintJob, policy: &DispatchPolicy) -> DispatchResult {
        let queued_ms = (chrono::Utc::now() - job.created_at).num_milliseconds();
        debug!(queued_ms, commands = job.commands.len(), "dispatching job");
        self.run(job.id, job.target.clone(), Work::Structured(&job), policy)
            .await
    }

    /// Deliver a raw command-language payload to a device.
    ///
    /// This is the inbound form matching the application layer's bridge
    /// call: the payload was already rendered as command text and passes
    /// through byte-for-byte, chunked at line boundaries.
    #[instrument(skip(self, payload, policy), fields(device = %target))]
    pub async fn dispatch_payload(
        &self,
        target: DeviceIdentity,
        payload: &[u8],
        policy: &DispatchPolicy,
    ) -> DispatchResult {
        let job_id = JobId::new();
        self.run(job_id, target, Work::Raw(payload), policy).await
    }

    /// Clear a session that is Faulted past its reconnect ceiling.
    /// Returns false when no session exists for the identity.
    pub async fn reset(&self, identity: &DeviceIdentity) -> bool {
        let session = { self.sessions.lock().await.get(identity).cloned() };
        match session {
            Some(session) => {
                session.lock().await.reset();
                info!(device = %identity, "session reset");
                true
            }
            None => false,
        }
    }

    /// Close every session and refuse further dispatches.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let drained: Vec<_> = {
            let mut sessions = self.sessions.lock().await;
            sessions.drain().collect()
        };
        for (_, session) in drained {
            session.lock().await.close().await;
        }
        info!("dispatcher shut down");
    }

    /// Close sessions idle past the configured idle timeout.
    ///
    /// Run opportunistically on each dispatch; callers with long quiet
    /// periods can also invoke it directly.
    pub async fn evict_idle(&self) {
        let mut evicted = Vec::new();
        {
            let mut sessions = self.sessions.lock().await;
            sessions.retain(|identity, session| match session.try_lock() {
                Ok(guard) => {
                    if guard.state() == SessionState::Idle
                        && guard.idle_for() > self.config.idle_timeout
                    {
                        debug!(device = %identity, "evicting idle session");
                        evicted.push(Arc::clone(session));
                        false
                    } else {
                        true
                    }
                }
                // A job holds the session; it is not idle.
                Err(_) => true,
            });
        }
        for session in evicted {
            session.lock().await.close().await;
        }
    }

    /// Number of live sessions (diagnostics).
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    async fn run(
        &self,
        job_id: JobId,
        target: DeviceIdentity,
        work: Work<'_>,
        policy: &DispatchPolicy,
    ) -> DispatchResult {
        if self.closed.load(Ordering::SeqCst) {
            return failure(
                job_id,
                DispatchOutcome::TransportError,
                "dispatcher shut down".into(),
                0,
            );
        }

        self.evict_idle().await;
        let session = self.session_for(&target).await;
        let attempts = AtomicU32::new(0);

        match tokio::time::timeout(
            policy.overall_timeout,
            self.attempt_loop(&session, job_id, work, policy, &attempts),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                // The in-flight transport call was cancelled; its true
                // state is unknown, so the session is faulted.
                session.lock().await.fault_abandoned().await;
                warn!(job_id = %job_id, "dispatch abandoned at overall timeout");
                failure(
                    job_id,
                    DispatchOutcome::Timeout,
                    format!(
                        "abandoned after overall timeout of {:?}; session faulted",
                        policy.overall_timeout
                    ),
                    attempts.load(Ordering::SeqCst),
                )
            }
        }
    }

    async fn attempt_loop(
        &self,
        session: &Arc<Mutex<DeviceSession>>,
        job_id: JobId,
        work: Work<'_>,
        policy: &DispatchPolicy,
        attempts: &AtomicU32,
    ) -> DispatchResult {
        let mut retries_used = 0;
        let mut busy_rechecked = false;

        loop {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;

            let submitted = match session.try_lock() {
                Ok(mut guard) => match work {
                    Work::Structured(job) => guard.submit(job).await,
                    Work::Raw(payload) => guard.submit_payload(job_id, payload).await,
                },
                // Another job holds the device: fail fast, no queueing.
                Err(_) => Err(LabelwerkError::DeviceBusy),
            };

            let error = match submitted {
                Ok(receipt) => return success(job_id, receipt, attempt),
                Err(error) => error,
            };
            let outcome = classify_error(&error);

            if outcome == DispatchOutcome::DeviceBusy {
                if policy.recheck_busy && !busy_rechecked {
                    busy_rechecked = true;
                    let delay = compute_backoff(policy, 0);
                    debug!(job_id = %job_id, delay_ms = delay.as_millis(), "device busy; one re-check");
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return failure(job_id, outcome, error.to_string(), attempt);
            }

            if is_retryable(outcome) && retries_used < policy.max_retries {
                let delay = compute_backoff(policy, retries_used);
                retries_used += 1;
                debug!(
                    job_id = %job_id,
                    retry = retries_used,
                    delay_ms = delay.as_millis(),
                    error = %error,
                    "retrying dispatch"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            return failure(job_id, outcome, error.to_string(), attempt);
        }
    }

    /// Resolve or create the session for an identity. The map lock is
    /// released before any transport I/O happens.
    async fn session_for(&self, identity: &DeviceIdentity) -> Arc<Mutex<DeviceSession>> {
        let mut sessions = self.sessions.lock().await;
        Arc::clone(sessions.entry(identity.clone()).or_insert_with(|| {
            debug!(device = %identity, "creating session");
            Arc::new(Mutex::new(DeviceSession::new(
                identity.clone(),
                self.profile.clone(),
                self.config.clone(),
                Arc::clone(&self.factory),
            )))
        }))
    }
}

fn success(job_id: JobId, receipt: SubmitReceipt, attempts: u32) -> DispatchResult {
    let diagnostic = receipt
        .status
        .as_ref()
        .map(|status| format!("device status {}", hex::encode(status)));
    DispatchResult {
        job_id,
        outcome: DispatchOutcome::Success,
        diagnostic,
        status: receipt.status,
        attempts,
        capture_path: receipt.capture_path,
    }
}

fn failure(
    job_id: JobId,
    outcome: DispatchOutcome,
    diagnostic: String,
    attempts: u32,
) -> DispatchResult {
    DispatchResult {
        job_id,
        outcome,
        diagnostic: Some(diagnostic),
        status: None,
        attempts,
        capture_path: None,
    }
}

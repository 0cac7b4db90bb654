// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Dispatch and session configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Per-dispatch retry and timeout policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchPolicy {
    /// How many times to resubmit after a transport error or timeout.
    /// Encoding failures are never retried.
    pub max_retries: u32,
    /// Base delay between attempts; grows exponentially per attempt.
    pub retry_backoff: Duration,
    /// Cap on the per-attempt delay.
    pub max_backoff: Duration,
    /// Hard ceiling across all attempts. A dispatch that exceeds it is
    /// abandoned with a Timeout result and the session is faulted.
    pub overall_timeout: Duration,
    /// On DeviceBusy, re-check once after one backoff before giving up.
    pub recheck_busy: bool,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            overall_timeout: Duration::from_secs(30),
            recheck_busy: true,
        }
    }
}

/// Per-session transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Bound on opening the transport.
    pub connect_timeout: Duration,
    /// Bound on the post-print status read, for transports that report
    /// one. `None` means no status is ever awaited (fire-and-forget).
    pub status_timeout: Option<Duration>,
    /// Consecutive failed reconnects before the session stays Faulted
    /// and fails fast until an explicit reset.
    pub reconnect_ceiling: u32,
    /// Sessions idle this long with no jobs are evicted and closed.
    pub idle_timeout: Duration,
    /// Baud rate for serial transports. Label printers ship at 9600 8N1.
    pub serial_baud: u32,
    /// When set, every encoded job is also written to
    /// `<dir>/<job-id>.tspl` and the path reported in the result.
    pub capture_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            status_timeout: Some(Duration::from_secs(5)),
            reconnect_ceiling: 3,
            idle_timeout: Duration::from_secs(300),
            serial_baud: 9600,
            capture_dir: None,
        }
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Outcome classification and backoff for the dispatch retry loop.
//
// Transport errors and timeouts are retried per policy. Encoding
// failures are deterministic client defects and never retried; busy
// contention gets at most one re-check so a slow device is not hammered.

use std::time::Duration;

use labelwerk_core::config::DispatchPolicy;
use labelwerk_core::error::LabelwerkError;
use labelwerk_core::types::DispatchOutcome;

/// Map an error to the outcome tag it resolves to.
pub fn classify_error(err: &LabelwerkError) -> DispatchOutcome {
    match err {
        LabelwerkError::Encoding { .. } => DispatchOutcome::EncodingError,
        LabelwerkError::StatusTimeout(_) => DispatchOutcome::Timeout,
        LabelwerkError::DeviceBusy => DispatchOutcome::DeviceBusy,
        LabelwerkError::Transport(_)
        | LabelwerkError::Address(_)
        | LabelwerkError::SessionClosed
        | LabelwerkError::Io(_)
        | LabelwerkError::Serialization(_) => DispatchOutcome::TransportError,
    }
}

/// Whether the policy's retry budget applies to this outcome.
pub fn is_retryable(outcome: DispatchOutcome) -> bool {
    matches!(
        outcome,
        DispatchOutcome::TransportError | DispatchOutcome::Timeout
    )
}

/// Delay before retry attempt `attempt` (zero-based).
///
/// delay = min(base * 2^attempt + spread, max_backoff)
/// The spread term staggers simultaneous retriers without a rand
/// dependency, same scheme as a hashed jitter.
pub fn compute_backoff(policy: &DispatchPolicy, attempt: u32) -> Duration {
    let base_ms = policy.retry_backoff.as_millis() as u64;
    let exp_ms = base_ms.saturating_mul(1u64 << attempt.min(10));
    let spread_ms = (attempt as u64).wrapping_mul(6364136223846793005) % base_ms.max(1);
    let capped_ms = exp_ms
        .saturating_add(spread_ms)
        .min(policy.max_backoff.as_millis() as u64);
    Duration::from_millis(capped_ms)
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Labelwerk.

use std::time::Duration;
use thiserror::Error;

/// Top-level error type for all Labelwerk operations.
#[derive(Debug, Error)]
pub enum LabelwerkError {
    // -- Encoding (client-side payload defects) --
    #[error("command {index} ({verb}): {field}: {reason}")]
    Encoding {
        /// Zero-based index of the offending command in the job.
        index: usize,
        /// Command-language verb of the offending command.
        verb: &'static str,
        /// The parameter that failed validation.
        field: &'static str,
        reason: String,
    },

    // -- Transport --
    #[error("transport error: {0}")]
    Transport(String),

    #[error("device address malformed: {0}")]
    Address(String),

    #[error("no status reply within {0:?}")]
    StatusTimeout(Duration),

    // -- Session --
    #[error("device busy")]
    DeviceBusy,

    #[error("session closed")]
    SessionClosed,

    // -- Plumbing --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LabelwerkError>;

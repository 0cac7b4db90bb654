// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Labelwerk dispatcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Unique identifier for a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Physical channel kinds a printer can be reached over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportKind {
    /// USB printer class device (usblp character device).
    Usb,
    /// Bluetooth SPP bound to an RFCOMM device node, or a plain RS-232 port.
    Bluetooth,
    /// TCP socket, JetDirect-style (default port 9100).
    Network,
    /// Debug capture: encoded bytes go to a local file instead of hardware.
    Capture,
}

impl TransportKind {
    /// Human-readable name for diagnostics and log fields.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Usb => "USB",
            Self::Bluetooth => "Bluetooth serial",
            Self::Network => "Network",
            Self::Capture => "Debug capture",
        }
    }
}

/// Identity of one physical printer: transport kind plus address.
///
/// Two identities are equal iff kind and address match exactly. This is
/// the sole sharding key for session reuse — two distinct printers never
/// share a session, and one printer is never opened twice concurrently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub kind: TransportKind,
    /// Serial path, RFCOMM node, `host:port`, or capture file path.
    pub address: String,
}

impl DeviceIdentity {
    /// USB printer at the given usblp device node (e.g. `/dev/usb/lp0`).
    pub fn usb(path: impl Into<String>) -> Self {
        Self {
            kind: TransportKind::Usb,
            address: path.into(),
        }
    }

    /// Bluetooth printer bound to an RFCOMM node (e.g. `/dev/rfcomm0`).
    pub fn bluetooth(device: impl Into<String>) -> Self {
        Self {
            kind: TransportKind::Bluetooth,
            address: device.into(),
        }
    }

    /// Network printer at `host:port`.
    pub fn network(host: impl AsRef<str>, port: u16) -> Self {
        Self {
            kind: TransportKind::Network,
            address: format!("{}:{}", host.as_ref(), port),
        }
    }

    /// Debug capture target writing the encoded stream to `path`.
    pub fn capture(path: impl Into<String>) -> Self {
        Self {
            kind: TransportKind::Capture,
            address: path.into(),
        }
    }
}

impl std::fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} @ {}", self.kind.display_name(), self.address)
    }
}

/// Rotation of a printed element, in quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rotation {
    None,
    Quarter,
    Half,
    ThreeQuarter,
}

impl Rotation {
    /// Degrees value used in the command language.
    pub fn degrees(&self) -> u16 {
        match self {
            Self::None => 0,
            Self::Quarter => 90,
            Self::Half => 180,
            Self::ThreeQuarter => 270,
        }
    }
}

/// Barcode symbologies of the label command language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbology {
    Code128,
    Code39,
    Ean13,
    Ean8,
    UpcA,
    Codabar,
    Interleaved2of5,
}

impl Symbology {
    /// TSPL `BARCODE` code-type keyword for this symbology.
    pub fn tspl_keyword(&self) -> &'static str {
        match self {
            Self::Code128 => "128",
            Self::Code39 => "39",
            Self::Ean13 => "EAN13",
            Self::Ean8 => "EAN8",
            Self::UpcA => "UPCA",
            Self::Codabar => "CODA",
            Self::Interleaved2of5 => "25",
        }
    }
}

/// One operation of the line-oriented label command language (TSPL dialect).
///
/// A job is an ordered sequence of these; the encoder serializes each to
/// exactly one command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LabelCommand {
    /// `SIZE`: label dimensions in millimetres.
    Size { width_mm: u32, height_mm: u32 },
    /// `GAP`: spacing between labels on the roll.
    Gap { gap_mm: u32, offset_mm: u32 },
    /// `DENSITY`: print darkness, 0 (lightest) to 15 (darkest).
    Density { level: u8 },
    /// `SPEED`: print speed in inches per second.
    Speed { ips: u8 },
    /// `DIRECTION`: paper exit orientation.
    Direction { reversed: bool },
    /// `CLS`: clear the image buffer.
    Clear,
    /// `TEXT`: draw a text run at dot coordinates.
    Text {
        x: u32,
        y: u32,
        /// Built-in bitmap font number (1-8).
        font: u8,
        rotation: Rotation,
        x_scale: u8,
        y_scale: u8,
        content: String,
    },
    /// `BARCODE`: draw a one-dimensional barcode at dot coordinates.
    Barcode {
        x: u32,
        y: u32,
        symbology: Symbology,
        /// Bar height in dots.
        height: u32,
        /// Print the human-readable interpretation line under the bars.
        human_readable: bool,
        rotation: Rotation,
        /// Narrow element width in dots.
        narrow: u8,
        /// Wide element width in dots.
        wide: u8,
        content: String,
    },
    /// `FEED`: advance the paper by the given number of dots.
    Feed { dots: u32 },
    /// `PRINT`: print the buffered label; `sets` label sets, `copies`
    /// copies of each set.
    Print { sets: u32, copies: u32 },
}

impl LabelCommand {
    /// The command-language verb, for diagnostics.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Size { .. } => "SIZE",
            Self::Gap { .. } => "GAP",
            Self::Density { .. } => "DENSITY",
            Self::Speed { .. } => "SPEED",
            Self::Direction { .. } => "DIRECTION",
            Self::Clear => "CLS",
            Self::Text { .. } => "TEXT",
            Self::Barcode { .. } => "BARCODE",
            Self::Feed { .. } => "FEED",
            Self::Print { .. } => "PRINT",
        }
    }
}

/// A complete print job. Immutable once submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintJob {
    pub id: JobId,
    /// Ordered command sequence; encoded in exactly this order.
    pub commands: Vec<LabelCommand>,
    /// The printer this job is addressed to.
    pub target: DeviceIdentity,
    pub created_at: DateTime<Utc>,
}

impl PrintJob {
    pub fn new(target: DeviceIdentity, commands: Vec<LabelCommand>) -> Self {
        Self {
            id: JobId::new(),
            commands,
            target,
            created_at: Utc::now(),
        }
    }
}

/// Lifecycle states of a device session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No job in flight; transport may or may not be open.
    Idle,
    /// Opening (or probing) the transport for a job.
    Connecting,
    /// A job is in the write/status critical section.
    Busy,
    /// Unrecoverable transport error; reconnect attempted on next job
    /// until the configured ceiling, then fail-fast until reset.
    Faulted,
    /// Terminal. Reached only by explicit shutdown.
    Closed,
}

/// Outcome tag of a dispatch. Exactly one per dispatch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchOutcome {
    /// Job delivered (status bytes attached when the transport reports them).
    Success,
    /// Connection or I/O failure, retried per policy.
    TransportError,
    /// Payload invalid for this device. A client defect, never retried.
    EncodingError,
    /// No confirmation within the bound. Ambiguous: the label may have
    /// printed even though the acknowledgment was lost.
    Timeout,
    /// Another job holds the device. Transient, safe to retry shortly.
    DeviceBusy,
}

/// The terminal result of one dispatch call.
///
/// Every dispatch resolves to exactly one of these; no failure escapes
/// the dispatcher as a panic or error value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResult {
    pub job_id: JobId,
    pub outcome: DispatchOutcome,
    /// Human-readable diagnostic: which command/field for encoding
    /// failures, attempt counts for transport failures.
    pub diagnostic: Option<String>,
    /// Raw status bytes echoed by the device, when the transport reads them.
    pub status: Option<Vec<u8>>,
    /// Submissions performed, including the final one.
    pub attempts: u32,
    /// Where the encoded stream was captured, in capture or tee mode.
    pub capture_path: Option<PathBuf>,
}

impl DispatchResult {
    pub fn is_success(&self) -> bool {
        self.outcome == DispatchOutcome::Success
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transport abstraction over the physical printer channel.
//
// Every variant presents the same byte-oriented duplex contract; the
// session never learns which cable the label travelled down. The factory
// seam exists so tests can substitute a scripted transport for hardware.

use std::time::Duration;

use async_trait::async_trait;

use labelwerk_core::config::SessionConfig;
use labelwerk_core::error::{LabelwerkError, Result};
use labelwerk_core::types::{DeviceIdentity, TransportKind};

pub mod capture;
pub mod network;
pub mod serial;
pub mod usb;

#[cfg(test)]
pub(crate) mod mock;

pub use capture::CaptureTransport;
pub use network::NetworkTransport;
pub use serial::SerialTransport;
pub use usb::UsbTransport;

/// A connected byte channel to one printer.
///
/// The underlying OS handle is released exactly once on every exit path:
/// `close` is the graceful form, `Drop` covers abandonment.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write one encoder chunk. Fails on broken pipe or mid-write
    /// disconnect; the caller decides what that does to the session.
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()>;

    /// Block up to `timeout` for the device's status reply.
    ///
    /// Returns `StatusTimeout` when nothing arrives in time. Only called
    /// when `expects_status` is true.
    async fn read_status(&mut self, timeout: Duration) -> Result<Vec<u8>>;

    /// Whether this channel echoes a status after printing. Variants
    /// returning false are fire-and-forget.
    fn expects_status(&self) -> bool {
        false
    }

    /// Cheap liveness probe used before session reuse. Not a guarantee —
    /// a live-looking channel can still break on the next write.
    async fn is_alive(&mut self) -> bool;

    /// Graceful release of the underlying handle. Idempotent.
    async fn close(&mut self) -> Result<()>;
}

/// Opens transports for device identities.
///
/// `SystemTransports` is the production factory; tests install scripted
/// factories through `Dispatcher::with_factory`.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Open a channel to the identified device.
    ///
    /// Fails with `Address` on a malformed address and `Transport` on
    /// permission denial or an absent device.
    async fn connect(
        &self,
        identity: &DeviceIdentity,
        config: &SessionConfig,
    ) -> Result<Box<dyn Transport>>;
}

/// Production factory dispatching on the identity's transport kind.
pub struct SystemTransports;

#[async_trait]
impl TransportFactory for SystemTransports {
    async fn connect(
        &self,
        identity: &DeviceIdentity,
        config: &SessionConfig,
    ) -> Result<Box<dyn Transport>> {
        match identity.kind {
            TransportKind::Network => {
                let transport =
                    NetworkTransport::connect(&identity.address, config.connect_timeout).await?;
                Ok(Box::new(transport))
            }
            TransportKind::Bluetooth => {
                let transport = SerialTransport::open(&identity.address, config.serial_baud)?;
                Ok(Box::new(transport))
            }
            TransportKind::Usb => {
                let transport = UsbTransport::open(&identity.address).await?;
                Ok(Box::new(transport))
            }
            TransportKind::Capture => {
                let transport = CaptureTransport::create(&identity.address).await?;
                Ok(Box::new(transport))
            }
        }
    }
}

/// Map an I/O failure during connect to the error taxonomy: permission
/// denial and absent devices are transport faults with distinct wording,
/// so the diagnostic tells the user which one they hit.
pub(crate) fn connect_error(what: &str, address: &str, e: std::io::Error) -> LabelwerkError {
    match e.kind() {
        std::io::ErrorKind::NotFound => {
            LabelwerkError::Transport(format!("{what} {address}: device absent"))
        }
        std::io::ErrorKind::PermissionDenied => LabelwerkError::Transport(format!(
            "{what} {address}: permission denied (dialout/lp group membership?)"
        )),
        _ => LabelwerkError::Transport(format!("{what} {address}: {e}")),
    }
}

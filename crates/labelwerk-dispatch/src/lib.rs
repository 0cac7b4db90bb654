// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Labelwerk Dispatch — command encoder, pluggable transports, per-device
// sessions, and the dispatcher entry point.  This crate bridges between
// the core domain types defined in `labelwerk-core` and the physical
// label printers.

pub mod capabilities;
pub mod dispatcher;
pub mod encoder;
pub mod retry;
pub mod session;
pub mod transport;

pub use capabilities::CapabilityProfile;
pub use dispatcher::Dispatcher;
pub use encoder::{EncodedJob, encode};
pub use session::DeviceSession;
pub use transport::{SystemTransports, Transport, TransportFactory};

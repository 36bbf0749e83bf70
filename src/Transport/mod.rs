//! The two interchangeable chat transports and the contract they share.

pub mod events;
pub mod lifecycle;
pub mod shm;
pub mod socket;

pub use events::{ChatEvent, ConnectionState, EventSink};
pub use shm::ShmTransport;
pub use socket::SocketTransport;

use crate::config::TransportKind;
use crate::error::Result;

/// Start/stop/send contract implemented by every transport.
///
/// Incoming text and status changes are not returned from these calls; they
/// are posted to the [`EventSink`] the transport was built with.
pub trait Transport: Send + Sync {
    /// Allocate resources and spawn the background thread(s).
    ///
    /// Fails with [`ChatError::AlreadyRunning`](crate::ChatError::AlreadyRunning)
    /// if called twice without a `stop` in between.
    fn start(&self) -> Result<()>;

    /// Write `text` to the peer from the caller's thread. Empty text is accepted and ignored.
    fn send(&self, text: &str) -> Result<()>;

    /// Cancel, unblock and join everything `start` spawned. Idempotent.
    fn stop(&self);

    fn state(&self) -> ConnectionState;

    fn kind(&self) -> TransportKind;
}

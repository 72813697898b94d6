//! Driver trait for abstracting I/O operations.
//!
//! The [`Driver`] trait decouples the runtime from specific I/O
//! implementations. Each frontend implements the trait to provide
//! platform-specific I/O, while the generic [`crate::Runtime`] handles all
//! orchestration.

use std::future::Future;

use tapparty_core::TimePoint;
use tapparty_proto::Frame;

use crate::Intent;

/// Abstracts I/O operations for the runtime.
///
/// All polling methods return immediately when nothing is ready; the
/// runtime paces itself with its own tick interval.
///
/// # Implementations
///
/// - **Bot**: WebSocket transport, scripted intents
/// - **Simulation**: in-memory queues, virtual time
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Time instant type. Enables virtual time in simulation.
    type Instant: TimePoint;

    /// Next user intent, or `None` if none is ready.
    ///
    /// # Errors
    ///
    /// Returns an error if the input source failed. This stops the runtime.
    fn poll_intent(&mut self) -> impl Future<Output = Result<Option<Intent>, Self::Error>> + Send;

    /// Open a transport to the relay.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay cannot be reached.
    fn open_transport(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Close the transport, if open.
    fn close_transport(&mut self);

    /// Send a frame to the relay.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport is closed or the send fails.
    fn send_frame(&mut self, frame: Frame) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Next frame from the relay, or `None` if none is ready.
    ///
    /// # Errors
    ///
    /// Returns an error once the transport has closed.
    fn recv_frame(&mut self) -> impl Future<Output = Result<Option<Frame>, Self::Error>> + Send;

    /// Current time instant.
    fn now(&self) -> Self::Instant;
}

//! Proximity hardware abstraction
//!
//! The host platform supplies the radio; this crate only needs a discovery
//! session primitive that can detect one tag, report its capability and
//! move records on and off it. Every step is a future awaited in sequence
//! by the session controller.

pub mod simulated;

pub use simulated::{SimulatedTransport, TagImage, TransportCall};

use crate::codec::NdefMessage;
use async_trait::async_trait;
use qtag_common::TagCapability;
use thiserror::Error;

/// Failures reported by the hardware primitive
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Platform refused to open a session (e.g. one is already active)
    #[error("{0}")]
    Rejected(String),

    /// Hardware-reported I/O failure, text forwarded verbatim
    #[error("{0}")]
    Io(String),

    /// User dismissed the session sheet or the platform timed it out
    #[error("Session cancelled")]
    Cancelled,
}

/// Capability and remaining capacity of a connected tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagStatus {
    pub capability: TagCapability,
    /// Bytes available for an encoded message
    pub capacity: usize,
}

/// Opens discovery sessions on the host's proximity hardware
#[async_trait]
pub trait TagTransport: Send + Sync {
    /// Open one discovery session showing `alert` to the user
    async fn begin(&self, alert: &str) -> Result<Box<dyn TagSession>, TransportError>;
}

/// One open discovery session
///
/// A session ends with exactly one call to [`TagSession::finish`] or
/// [`TagSession::invalidate`]. Dropping a session without either ends it
/// silently.
#[async_trait]
pub trait TagSession: Send {
    /// Wait for a tag to come into range
    async fn detect(&mut self) -> Result<(), TransportError>;

    async fn connect(&mut self) -> Result<(), TransportError>;

    async fn query_status(&mut self) -> Result<TagStatus, TransportError>;

    async fn read_message(&mut self) -> Result<NdefMessage, TransportError>;

    async fn write_message(&mut self, message: &NdefMessage) -> Result<(), TransportError>;

    /// Irreversibly make the tag read-only
    async fn write_lock(&mut self) -> Result<(), TransportError>;

    /// Close the session normally, showing `alert`
    async fn finish(&mut self, alert: &str);

    /// Close the session with an error message for the user
    async fn invalidate(&mut self, message: &str);
}

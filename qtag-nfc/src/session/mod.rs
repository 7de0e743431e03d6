//! Discovery session control
//!
//! [`TagController`] runs one session at a time over a
//! [`crate::transport::TagTransport`]; [`ControllerHandle`] shares a
//! controller between owners and rejects overlapping starts.

mod controller;
mod error;
mod handle;
mod state;

pub use controller::TagController;
pub use error::{CapabilityError, SessionError};
pub use handle::{ControllerHandle, SessionTask};
pub use state::{SessionPhase, SessionState, WriteReport, WriteRequest};

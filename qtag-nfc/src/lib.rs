//! # QTag NFC Library (qtag-nfc)
//!
//! Reads and writes queue-slot tags over proximity hardware.
//!
//! **Purpose:** Encode a queue-slot identifier and role onto a tag, read it
//! back, classify what was read for the context that asked, and hand the
//! outcome to whichever consumer started the scan.
//!
//! **Architecture:**
//! - [`codec`]: record bytes and the URL payload format
//! - [`classifier`]: per-context success/failure rules
//! - [`results`]: one mailbox per scan context
//! - [`session`]: discovery session state machine and shared handle
//! - [`transport`]: hardware abstraction plus an in-memory simulator
//! - [`consumer`]: remote-store calls driven by scan results

pub mod classifier;
pub mod codec;
pub mod consumer;
pub mod error;
pub mod identifier;
pub mod results;
pub mod session;
pub mod transport;

pub use classifier::{classify, ExtractionOutcome, FailureReason};
pub use codec::RecordProfile;
pub use consumer::{ConsumerAction, RemoteStore, ScanConsumer};
pub use error::{Error, Result};
pub use identifier::{Identifier, Role};
pub use results::{ObservedIdentifier, ResultChannel, ScanResult};
pub use session::{ControllerHandle, SessionError, TagController, WriteReport, WriteRequest};

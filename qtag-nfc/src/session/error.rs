//! Session failure taxonomy
//!
//! `Display` output is the text shown to the user when a session is
//! invalidated.

use crate::transport::TransportError;
use thiserror::Error;

/// Tag cannot serve the requested operation
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("Tag is not in the supported format")]
    Unsupported,

    #[error("Tag is not writable")]
    NotWritable,
}

/// Terminal failure of one discovery session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// Encoded payload does not fit; nothing was written
    #[error("Tag is too small: at least {required} bytes are required ({available} available)")]
    Capacity { required: usize, available: usize },

    /// Hardware-reported failure during connect/read/write
    #[error("{0}")]
    Io(String),

    /// Payload was written but the lock step failed
    #[error("Tag was written but could not be locked: {0}")]
    Lock(String),

    /// Platform refused to open the session
    #[error("Could not start a tag session: {0}")]
    Rejected(String),

    /// Another session started through the same handle is still pending
    #[error("A tag session is already in progress")]
    Busy,

    #[error("Session cancelled")]
    Cancelled,
}

impl SessionError {
    /// Data is on the tag but the lock did not take
    pub fn is_partial_write(&self) -> bool {
        matches!(self, SessionError::Lock(_))
    }
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Rejected(reason) => SessionError::Rejected(reason),
            TransportError::Io(reason) => SessionError::Io(reason),
            TransportError::Cancelled => SessionError::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_message_names_required_size() {
        let err = SessionError::Capacity { required: 120, available: 64 };
        let text = err.to_string();
        assert!(text.contains("120"));
        assert!(text.contains("64"));
    }

    #[test]
    fn test_io_forwarded_verbatim() {
        let err: SessionError = TransportError::Io("Tag response error".to_string()).into();
        assert_eq!(err.to_string(), "Tag response error");
    }

    #[test]
    fn test_capability_messages() {
        assert_eq!(
            SessionError::from(CapabilityError::Unsupported).to_string(),
            "Tag is not in the supported format"
        );
        assert_eq!(
            SessionError::from(CapabilityError::NotWritable).to_string(),
            "Tag is not writable"
        );
    }

    #[test]
    fn test_lock_failure_is_partial_write() {
        assert!(SessionError::Lock("x".to_string()).is_partial_write());
        assert!(!SessionError::Io("x".to_string()).is_partial_write());
    }
}

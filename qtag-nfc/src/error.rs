//! Error types for qtag-nfc
//!
//! Session-level failures shown to the user live in [`SessionError`]; this
//! enum wraps them together with the ambient failures of the CLI and the
//! consumer seam.

use crate::codec::CodecError;
use crate::session::SessionError;
use thiserror::Error;

/// Main error type for qtag-nfc
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration and shared-library errors
    #[error(transparent)]
    Common(#[from] qtag_common::Error),

    /// Terminal session failure
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Malformed record bytes
    #[error("Record codec error: {0}")]
    Codec(#[from] CodecError),

    /// Remote store call made by a consumer failed
    #[error("Remote store error: {0}")]
    RemoteStore(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Tag image (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience Result type using qtag-nfc Error
pub type Result<T> = std::result::Result<T, Error>;

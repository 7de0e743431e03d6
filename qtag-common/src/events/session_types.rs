//! Session type definitions
//!
//! Small closed enums shared by the session controller and everything that
//! observes its events.

use serde::{Deserialize, Serialize};

/// Which logical consumer initiated a read session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ScanContext {
    /// Operational "complete the queue slot" flow
    Normal,
    /// Read-only inspection flow
    Diagnostics,
}

impl ScanContext {
    /// Operation mode a read session runs in for this context
    pub fn read_mode(self) -> OperationMode {
        match self {
            ScanContext::Normal => OperationMode::Read,
            ScanContext::Diagnostics => OperationMode::ReadForDiagnostics,
        }
    }
}

impl std::fmt::Display for ScanContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanContext::Normal => write!(f, "Normal"),
            ScanContext::Diagnostics => write!(f, "Diagnostics"),
        }
    }
}

/// Operation a discovery session was opened for
///
/// Fixed when the session opens; never changes for the session's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum OperationMode {
    Read,
    ReadForDiagnostics,
    Write,
}

impl std::fmt::Display for OperationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationMode::Read => write!(f, "Read"),
            OperationMode::ReadForDiagnostics => write!(f, "ReadForDiagnostics"),
            OperationMode::Write => write!(f, "Write"),
        }
    }
}

/// Tag capability as reported by the hardware for a detected tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum TagCapability {
    /// Tag does not carry the supported record format
    Unsupported,
    ReadOnly,
    ReadWrite,
}

impl std::fmt::Display for TagCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TagCapability::Unsupported => write!(f, "Unsupported"),
            TagCapability::ReadOnly => write!(f, "ReadOnly"),
            TagCapability::ReadWrite => write!(f, "ReadWrite"),
        }
    }
}

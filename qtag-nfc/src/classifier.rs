//! Extraction classifier
//!
//! Turns decoded query fields into a success/failure outcome. The rules
//! differ per context: diagnostics accepts either role, the normal flow
//! accepts only staff tags and names the customer-tag mistake explicitly.

use crate::codec::DecodedFields;
use crate::identifier::{Identifier, Role};
use qtag_common::ScanContext;
use serde::{Deserialize, Serialize};

/// Display-ready reason a scan did not yield a usable identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// Empty, ambiguous, foreign or malformed tag content
    InvalidContent,
    /// A customer tag was scanned in the normal flow
    CustomerTagScanned,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::InvalidContent => write!(f, "Tag content is invalid or unrecognized"),
            FailureReason::CustomerTagScanned => {
                write!(f, "This is a customer tag. Scan the staff tag instead")
            }
        }
    }
}

/// Result of classifying one decoded record set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionOutcome {
    pub identifier: Option<Identifier>,
    pub failure: Option<FailureReason>,
}

impl ExtractionOutcome {
    fn success(identifier: Identifier) -> Self {
        Self {
            identifier: Some(identifier),
            failure: None,
        }
    }

    fn failed(reason: FailureReason) -> Self {
        Self {
            identifier: None,
            failure: Some(reason),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.failure.is_none() && self.identifier.is_some()
    }

    /// Human-readable failure text, empty on success
    pub fn failure_reason(&self) -> String {
        self.failure.map(|r| r.to_string()).unwrap_or_default()
    }
}

/// Classify decoded fields for the context that started the scan
///
/// `None` (no usable record) classifies like empty fields.
pub fn classify(decoded: Option<&DecodedFields>, context: ScanContext) -> ExtractionOutcome {
    let (id, token) = match decoded {
        Some(fields) if !fields.id.is_empty() && !fields.role_token.is_empty() => {
            (fields.id.as_str(), fields.role_token.as_str())
        }
        _ => return ExtractionOutcome::failed(FailureReason::InvalidContent),
    };

    let role = Role::from_token(token);
    match context {
        ScanContext::Diagnostics => match role {
            Some(role) => ExtractionOutcome::success(Identifier::new(id, role)),
            None => ExtractionOutcome::failed(FailureReason::InvalidContent),
        },
        ScanContext::Normal => match role {
            Some(Role::Primary) => ExtractionOutcome::success(Identifier::new(id, Role::Primary)),
            Some(Role::Secondary) => ExtractionOutcome::failed(FailureReason::CustomerTagScanned),
            None => ExtractionOutcome::failed(FailureReason::InvalidContent),
        },
    }
}

//! Session state machine
//!
//! `Idle → SessionOpen → Dispatching → {Reading | Writing} → Idle`, with
//! any open state allowed to fall back to `Idle` on a terminal failure.
//! Nothing is retained across sessions.

use crate::identifier::{Identifier, Role};
use qtag_common::{OperationMode, ScanContext, TagCapability};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Caller-supplied content for a write session
///
/// The role written is the payload's role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRequest {
    pub payload: Identifier,
    /// Permanently lock the tag after a successful write
    pub lock: bool,
}

impl WriteRequest {
    pub fn new(payload: Identifier, lock: bool) -> Self {
        Self { payload, lock }
    }

    pub fn role(&self) -> Role {
        self.payload.role
    }
}

/// Successful write session summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteReport {
    /// Encoded message length
    pub bytes: usize,
    pub locked: bool,
}

/// Controller state, with the data each state owns
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    /// Waiting for a tag
    SessionOpen { session_id: Uuid, mode: OperationMode },
    /// Tag connected, capability being queried
    Dispatching { session_id: Uuid, mode: OperationMode },
    Reading {
        session_id: Uuid,
        context: ScanContext,
        capability: TagCapability,
    },
    Writing {
        session_id: Uuid,
        request: WriteRequest,
        capacity: usize,
    },
}

/// Observable kind of a [`SessionState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    Idle,
    SessionOpen,
    Dispatching,
    Reading,
    Writing,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionPhase::Idle => write!(f, "Idle"),
            SessionPhase::SessionOpen => write!(f, "SessionOpen"),
            SessionPhase::Dispatching => write!(f, "Dispatching"),
            SessionPhase::Reading => write!(f, "Reading"),
            SessionPhase::Writing => write!(f, "Writing"),
        }
    }
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Idle => SessionPhase::Idle,
            SessionState::SessionOpen { .. } => SessionPhase::SessionOpen,
            SessionState::Dispatching { .. } => SessionPhase::Dispatching,
            SessionState::Reading { .. } => SessionPhase::Reading,
            SessionState::Writing { .. } => SessionPhase::Writing,
        }
    }

    pub fn session_id(&self) -> Option<Uuid> {
        match self {
            SessionState::Idle => None,
            SessionState::SessionOpen { session_id, .. }
            | SessionState::Dispatching { session_id, .. }
            | SessionState::Reading { session_id, .. }
            | SessionState::Writing { session_id, .. } => Some(*session_id),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, SessionState::Idle)
    }

    /// Whether moving to `next` follows the documented lifecycle
    pub fn permits(&self, next: &SessionState) -> bool {
        use SessionPhase::*;
        matches!(
            (self.phase(), next.phase()),
            (Idle, SessionOpen)
                | (SessionOpen, Dispatching)
                | (Dispatching, Reading)
                | (Dispatching, Writing)
                | (SessionOpen, Idle)
                | (Dispatching, Idle)
                | (Reading, Idle)
                | (Writing, Idle)
        )
    }
}

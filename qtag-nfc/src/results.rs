//! Result channel
//!
//! Terminal read outcomes are delivered through one mailbox per context.
//! Each mailbox holds the latest result and its own changed flag, so a
//! normal scan and a diagnostic scan can share one controller without
//! either consumer seeing the other's value.

use crate::classifier::{ExtractionOutcome, FailureReason};
use crate::identifier::Identifier;
use chrono::{DateTime, Utc};
use qtag_common::{ScanContext, TagCapability};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// Identifier as observed on a physical tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedIdentifier {
    pub identifier: Identifier,
    pub is_read_only: bool,
    pub observed_at: DateTime<Utc>,
}

/// Terminal outcome of one read session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail")]
pub enum ScanResult {
    Success(ObservedIdentifier),
    Failure(FailureReason),
}

impl ScanResult {
    /// Translate a classifier outcome for a tag of the given capability
    pub fn from_outcome(
        outcome: ExtractionOutcome,
        capability: TagCapability,
        observed_at: DateTime<Utc>,
    ) -> Self {
        match (outcome.identifier, outcome.failure) {
            (Some(identifier), None) => ScanResult::Success(ObservedIdentifier {
                identifier,
                is_read_only: capability == TagCapability::ReadOnly,
                observed_at,
            }),
            (_, failure) => ScanResult::Failure(failure.unwrap_or(FailureReason::InvalidContent)),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ScanResult::Success(_))
    }

    pub fn identifier(&self) -> Option<&Identifier> {
        match self {
            ScanResult::Success(observed) => Some(&observed.identifier),
            ScanResult::Failure(_) => None,
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    latest: Option<ScanResult>,
    changed: bool,
}

#[derive(Debug, Default)]
struct Mailbox {
    slot: Mutex<Slot>,
    notify: Notify,
}

impl Mailbox {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Default)]
struct Mailboxes {
    normal: Mailbox,
    diagnostics: Mailbox,
}

/// Per-context result mailboxes shared by the controller and consumers
///
/// Cloning yields another handle onto the same mailboxes.
#[derive(Debug, Clone, Default)]
pub struct ResultChannel {
    inner: Arc<Mailboxes>,
}

impl ResultChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn mailbox(&self, context: ScanContext) -> &Mailbox {
        match context {
            ScanContext::Normal => &self.inner.normal,
            ScanContext::Diagnostics => &self.inner.diagnostics,
        }
    }

    /// Replace the context's latest result and raise its changed flag
    ///
    /// The other context's mailbox is untouched.
    pub fn publish(&self, context: ScanContext, result: ScanResult) {
        let mailbox = self.mailbox(context);
        {
            let mut slot = mailbox.lock();
            slot.latest = Some(result);
            slot.changed = true;
        }
        mailbox.notify.notify_waiters();
    }

    /// Drop the context's latest result and lower its changed flag
    pub fn clear(&self, context: ScanContext) {
        let mut slot = self.mailbox(context).lock();
        slot.latest = None;
        slot.changed = false;
    }

    pub fn latest(&self, context: ScanContext) -> Option<ScanResult> {
        self.mailbox(context).lock().latest.clone()
    }

    pub fn has_changed(&self, context: ScanContext) -> bool {
        self.mailbox(context).lock().changed
    }

    /// Lower the context's changed flag without reading
    pub fn acknowledge(&self, context: ScanContext) {
        self.mailbox(context).lock().changed = false;
    }

    /// Read the latest result if the changed flag is raised, lowering it
    pub fn take(&self, context: ScanContext) -> Option<ScanResult> {
        let mut slot = self.mailbox(context).lock();
        if !slot.changed {
            return None;
        }
        slot.changed = false;
        slot.latest.clone()
    }

    /// Wait until a result is published for the context, then take it
    pub async fn wait(&self, context: ScanContext) -> ScanResult {
        let mailbox = self.mailbox(context);
        loop {
            let notified = mailbox.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a publish in between is not missed
            notified.as_mut().enable();

            if let Some(result) = self.take(context) {
                return result;
            }
            notified.await;
        }
    }
}

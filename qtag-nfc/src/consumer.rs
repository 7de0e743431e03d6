//! Scan consumers
//!
//! A consumer watches one context's mailbox and turns each published
//! result into at most one remote call:
//! - Normal success: mark the queue slot completed
//! - Diagnostics success: fetch the tag's detail record
//! - Failure: no remote call, the reason is handed back for display

use crate::classifier::FailureReason;
use crate::error::Result;
use crate::results::{ResultChannel, ScanResult};
use async_trait::async_trait;
use qtag_common::ScanContext;
use serde_json::Value;
use tracing::{debug, info};

/// Queue-management backend reached after a successful scan
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Mark the queue slot identified by `id` as completed
    async fn complete_slot(&self, id: &str) -> Result<()>;

    /// Fetch the stored detail for the tag identified by `id`
    async fn fetch_tag_detail(&self, id: &str) -> Result<Value>;
}

/// What a consumer did with one scan result
#[derive(Debug, Clone, PartialEq)]
pub enum ConsumerAction {
    Completed { id: String },
    DetailFetched { id: String, detail: Value },
    Rejected(FailureReason),
}

/// Consumer bound to a single scan context
#[derive(Debug, Clone)]
pub struct ScanConsumer {
    context: ScanContext,
    results: ResultChannel,
}

impl ScanConsumer {
    pub fn new(context: ScanContext, results: ResultChannel) -> Self {
        Self { context, results }
    }

    pub fn context(&self) -> ScanContext {
        self.context
    }

    /// Take a pending result without waiting
    pub fn poll(&self) -> Option<ScanResult> {
        self.results.take(self.context)
    }

    /// Wait for the next result published to this consumer's context
    pub async fn next(&self) -> ScanResult {
        self.results.wait(self.context).await
    }

    /// Forward one result to the store
    pub async fn handle<S: RemoteStore + ?Sized>(
        &self,
        result: &ScanResult,
        store: &S,
    ) -> Result<ConsumerAction> {
        let observed = match result {
            ScanResult::Success(observed) => observed,
            ScanResult::Failure(reason) => {
                debug!("{} consumer: scan failed ({}), no remote call", self.context, reason);
                return Ok(ConsumerAction::Rejected(*reason));
            }
        };

        let id = observed.identifier.id.clone();
        match self.context {
            ScanContext::Normal => {
                store.complete_slot(&id).await?;
                info!("Queue slot {} completed", id);
                Ok(ConsumerAction::Completed { id })
            }
            ScanContext::Diagnostics => {
                let detail = store.fetch_tag_detail(&id).await?;
                info!("Fetched detail for tag {}", id);
                Ok(ConsumerAction::DetailFetched { id, detail })
            }
        }
    }

    pub async fn next_and_handle<S: RemoteStore + ?Sized>(&self, store: &S) -> Result<ConsumerAction> {
        let result = self.next().await;
        self.handle(&result, store).await
    }
}

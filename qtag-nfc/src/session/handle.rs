//! Shared controller handle
//!
//! Lets several owners (UI, CLI, tests) start sessions on one controller.
//! At most one session runs at a time; a start while another is pending
//! fails immediately with [`SessionError::Busy`] instead of queueing.

use super::controller::TagController;
use super::error::SessionError;
use super::state::{SessionPhase, WriteReport, WriteRequest};
use crate::results::{ResultChannel, ScanResult};
use crate::transport::TagTransport;
use qtag_common::{EventBus, ScanContext};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::warn;

/// Cloneable handle onto one [`TagController`]
pub struct ControllerHandle<T: TagTransport> {
    inner: Arc<Mutex<TagController<T>>>,
    results: ResultChannel,
    events: EventBus,
    phase: watch::Receiver<SessionPhase>,
}

impl<T: TagTransport> Clone for ControllerHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            results: self.results.clone(),
            events: self.events.clone(),
            phase: self.phase.clone(),
        }
    }
}

impl<T: TagTransport + 'static> ControllerHandle<T> {
    pub fn new(controller: TagController<T>) -> Self {
        Self {
            results: controller.results(),
            events: controller.events().clone(),
            phase: controller.watch_phase(),
            inner: Arc::new(Mutex::new(controller)),
        }
    }

    pub fn results(&self) -> ResultChannel {
        self.results.clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    /// Whether a session started through any clone is still pending
    pub fn is_busy(&self) -> bool {
        self.inner.try_lock().is_err()
    }

    /// Spawn a read session for `context`
    pub fn start_read(&self, context: ScanContext) -> Result<SessionTask<ScanResult>, SessionError> {
        let mut controller = self.claim()?;
        Ok(SessionTask::spawn(move |cancel| async move {
            controller.start_read_with_cancel(context, &cancel).await
        }))
    }

    /// Spawn a write session
    pub fn start_write(
        &self,
        request: WriteRequest,
    ) -> Result<SessionTask<WriteReport>, SessionError> {
        let mut controller = self.claim()?;
        Ok(SessionTask::spawn(move |cancel| async move {
            controller.start_write_with_cancel(request, &cancel).await
        }))
    }

    fn claim(&self) -> Result<tokio::sync::OwnedMutexGuard<TagController<T>>, SessionError> {
        Arc::clone(&self.inner).try_lock_owned().map_err(|_| {
            warn!("Session start rejected: another session is in progress");
            SessionError::Busy
        })
    }
}

/// A spawned session that can be cancelled or awaited
///
/// Dropping the task without joining it cancels the session, releasing the
/// controller for the next start.
pub struct SessionTask<R> {
    handle: JoinHandle<Result<R, SessionError>>,
    cancel: CancellationToken,
    cancel_on_drop: DropGuard,
}

impl<R: Send + 'static> SessionTask<R> {
    fn spawn<F, Fut>(run: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: std::future::Future<Output = Result<R, SessionError>> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(cancel.clone()));
        Self {
            handle,
            cancel_on_drop: cancel.clone().drop_guard(),
            cancel,
        }
    }

    /// Request cancellation; the session is invalidated at its next step
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the session's terminal outcome
    pub async fn join(self) -> Result<R, SessionError> {
        let SessionTask {
            handle,
            cancel_on_drop,
            ..
        } = self;
        cancel_on_drop.disarm();

        match handle.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => Err(SessionError::Cancelled),
            Err(e) => {
                warn!("Session task failed: {}", e);
                Err(SessionError::Io("Session task panicked".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::RecordProfile;
    use crate::transport::simulated::DEFAULT_CAPACITY;
    use crate::transport::{SimulatedTransport, TagImage};
    use qtag_common::config::SessionConfig;

    fn handle(transport: SimulatedTransport) -> ControllerHandle<SimulatedTransport> {
        ControllerHandle::new(TagController::new(
            transport,
            RecordProfile::default(),
            SessionConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_second_start_is_busy_until_first_ends() {
        let handle = handle(SimulatedTransport::new(TagImage::blank(DEFAULT_CAPACITY)));

        let first = handle.start_read(ScanContext::Normal).unwrap();
        assert!(matches!(
            handle.clone().start_read(ScanContext::Diagnostics),
            Err(SessionError::Busy)
        ));

        let result = first.join().await.unwrap();
        assert!(!result.is_success());
        assert!(!handle.is_busy());
        assert!(handle.start_read(ScanContext::Diagnostics).is_ok());
    }

    #[tokio::test]
    async fn test_cancel_pending_session() {
        let transport = SimulatedTransport::without_tag();
        let handle = handle(transport.clone());

        let task = handle.start_read(ScanContext::Diagnostics).unwrap();
        task.cancel();

        assert_eq!(task.join().await.unwrap_err(), SessionError::Cancelled);
        assert!(!transport.is_active());
        assert_eq!(handle.phase(), SessionPhase::Idle);
    }

    #[tokio::test]
    async fn test_dropped_task_releases_controller() {
        let transport = SimulatedTransport::without_tag();
        let handle = handle(transport.clone());

        drop(handle.start_read(ScanContext::Normal).unwrap());

        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while handle.is_busy() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("controller released after drop");
        assert!(!transport.is_active());
        assert!(handle.start_read(ScanContext::Diagnostics).is_ok());
    }
}

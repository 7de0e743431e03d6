//! Session controller - one discovery session from open to close
//!
//! **Responsibilities:**
//! - Open exactly one discovery session per call
//! - Dispatch on tag capability and operation mode
//! - Read path: decode, classify, publish to the initiating context's mailbox
//! - Write path: capacity check, write, optional lock
//! - Close the session with a success alert or invalidate it with the
//!   failure text
//!
//! Every branch is terminal for its session; nothing is retried here. The
//! start methods take `&mut self`, so a controller can only drive one
//! session at a time. [`super::ControllerHandle`] covers callers that share
//! a controller.

use super::error::{CapabilityError, SessionError};
use super::state::{SessionPhase, SessionState, WriteReport, WriteRequest};
use crate::classifier::classify;
use crate::codec::{self, CodecError, RecordProfile};
use crate::results::{ResultChannel, ScanResult};
use crate::transport::{TagSession, TagStatus, TagTransport};
use chrono::Utc;
use qtag_common::config::{SessionConfig, TomlConfig};
use qtag_common::{EventBus, OperationMode, ScanContext, TagCapability, TagEvent};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Drives discovery sessions over a [`TagTransport`]
pub struct TagController<T: TagTransport> {
    transport: T,
    profile: RecordProfile,
    alerts: SessionConfig,
    results: ResultChannel,
    events: EventBus,
    state: SessionState,
    phase_tx: watch::Sender<SessionPhase>,
}

impl<T: TagTransport> TagController<T> {
    pub fn new(transport: T, profile: RecordProfile, alerts: SessionConfig) -> Self {
        let events = EventBus::new(alerts.event_capacity);
        let (phase_tx, _) = watch::channel(SessionPhase::Idle);
        Self {
            transport,
            profile,
            alerts,
            results: ResultChannel::new(),
            events,
            state: SessionState::Idle,
            phase_tx,
        }
    }

    /// Build a controller from the loaded configuration file
    pub fn from_config(transport: T, config: &TomlConfig) -> Result<Self, CodecError> {
        let profile = RecordProfile::try_from(&config.record)?;
        Ok(Self::new(transport, profile, config.session.clone()))
    }

    /// Publish into an existing result channel instead of a private one
    pub fn with_results(mut self, results: ResultChannel) -> Self {
        self.results = results;
        self
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn results(&self) -> ResultChannel {
        self.results.clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn profile(&self) -> &RecordProfile {
        &self.profile
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Observe state changes without access to the controller
    pub fn watch_phase(&self) -> watch::Receiver<SessionPhase> {
        self.phase_tx.subscribe()
    }

    /// Read a tag for `context`
    ///
    /// Clears the context's mailbox, then runs one session. A completed
    /// read (success or classified failure) is published to the context's
    /// mailbox and also returned. Capability and hardware failures
    /// invalidate the session and publish nothing.
    pub async fn start_read(&mut self, context: ScanContext) -> Result<ScanResult, SessionError> {
        self.start_read_with_cancel(context, &CancellationToken::new())
            .await
    }

    pub async fn start_read_with_cancel(
        &mut self,
        context: ScanContext,
        cancel: &CancellationToken,
    ) -> Result<ScanResult, SessionError> {
        self.results.clear(context);
        let (mut session, session_id) = self.open(context.read_mode()).await?;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SessionError::Cancelled),
            outcome = self.read_flow(session.as_mut(), session_id, context) => outcome,
        };

        let alert = match &outcome {
            Ok(ScanResult::Success(_)) => Ok(self.alerts.read_success_alert.clone()),
            Ok(ScanResult::Failure(reason)) => Ok(reason.to_string()),
            Err(e) => Err(e),
        };
        self.close(session.as_mut(), session_id, alert).await;
        outcome
    }

    /// Write `request` to a writable tag
    ///
    /// Encoding happens only once a writable tag is connected, so capacity
    /// is checked against the real encoded size. No scan result is
    /// published for writes.
    pub async fn start_write(&mut self, request: WriteRequest) -> Result<WriteReport, SessionError> {
        self.start_write_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Cancellation is honoured until the payload is handed to the
    /// hardware. From then on the write and its lock step run to
    /// completion and report their own outcome.
    pub async fn start_write_with_cancel(
        &mut self,
        request: WriteRequest,
        cancel: &CancellationToken,
    ) -> Result<WriteReport, SessionError> {
        let (mut session, session_id) = self.open(OperationMode::Write).await?;

        let outcome = self
            .write_flow(session.as_mut(), session_id, &request, cancel)
            .await;

        let alert = match &outcome {
            Ok(report) if report.locked => Ok(self.alerts.lock_success_alert.clone()),
            Ok(_) => Ok(self.alerts.write_success_alert.clone()),
            Err(e) => Err(e),
        };
        self.close(session.as_mut(), session_id, alert).await;
        outcome
    }

    async fn open(
        &mut self,
        mode: OperationMode,
    ) -> Result<(Box<dyn TagSession>, Uuid), SessionError> {
        if !self.state.is_idle() {
            // A previous start future was dropped mid-session
            warn!(
                "Abandoned session {:?} left in {}, resetting",
                self.state.session_id(),
                self.state.phase()
            );
            self.set_state(SessionState::Idle);
        }

        let session = self
            .transport
            .begin(&self.alerts.begin_alert)
            .await
            .map_err(|e| {
                warn!("Discovery session could not be opened: {}", e);
                SessionError::from(e)
            })?;

        let session_id = Uuid::new_v4();
        self.transition(SessionState::SessionOpen { session_id, mode });
        info!("Session {} opened for {}", session_id, mode);
        self.events.emit_lossy(TagEvent::SessionOpened {
            session_id,
            mode,
            timestamp: Utc::now(),
        });

        Ok((session, session_id))
    }

    /// Wait for a tag, connect, and report its capability
    async fn dispatch(
        &mut self,
        session: &mut dyn TagSession,
        session_id: Uuid,
        mode: OperationMode,
    ) -> Result<TagStatus, SessionError> {
        session.detect().await?;
        session.connect().await?;
        self.transition(SessionState::Dispatching { session_id, mode });

        let status = session.query_status().await?;
        debug!(
            "Session {}: tag capability {}, capacity {} bytes",
            session_id, status.capability, status.capacity
        );
        self.events.emit_lossy(TagEvent::TagDetected {
            session_id,
            capability: status.capability,
            capacity: status.capacity,
            timestamp: Utc::now(),
        });
        Ok(status)
    }

    async fn read_flow(
        &mut self,
        session: &mut dyn TagSession,
        session_id: Uuid,
        context: ScanContext,
    ) -> Result<ScanResult, SessionError> {
        let status = self.dispatch(session, session_id, context.read_mode()).await?;
        let capability = match status.capability {
            TagCapability::Unsupported => return Err(CapabilityError::Unsupported.into()),
            capability => capability,
        };

        self.transition(SessionState::Reading {
            session_id,
            context,
            capability,
        });
        let message = session.read_message().await?;
        let decoded = codec::decode(message.records(), &self.profile);
        let outcome = classify(decoded.as_ref(), context);
        let result = ScanResult::from_outcome(outcome, capability, Utc::now());

        self.publish(session_id, context, result.clone());
        Ok(result)
    }

    async fn write_flow(
        &mut self,
        session: &mut dyn TagSession,
        session_id: Uuid,
        request: &WriteRequest,
        cancel: &CancellationToken,
    ) -> Result<WriteReport, SessionError> {
        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SessionError::Cancelled),
            status = self.dispatch(session, session_id, OperationMode::Write) => status?,
        };
        match status.capability {
            TagCapability::Unsupported => return Err(CapabilityError::Unsupported.into()),
            TagCapability::ReadOnly => return Err(CapabilityError::NotWritable.into()),
            TagCapability::ReadWrite => {}
        }

        self.transition(SessionState::Writing {
            session_id,
            request: request.clone(),
            capacity: status.capacity,
        });

        let message = codec::encode(&request.payload, &self.profile);
        let required = message.byte_len();
        if required > status.capacity {
            return Err(SessionError::Capacity {
                required,
                available: status.capacity,
            });
        }

        if cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        session.write_message(&message).await?;
        info!(
            "Session {}: wrote {} bytes for {} ({})",
            session_id,
            required,
            request.payload.id,
            request.role()
        );

        if !request.lock {
            self.emit_written(session_id, required, false);
            return Ok(WriteReport {
                bytes: required,
                locked: false,
            });
        }

        if let Err(e) = session.write_lock().await {
            // Payload is already on the tag
            self.emit_written(session_id, required, false);
            return Err(SessionError::Lock(e.to_string()));
        }
        info!("Session {}: tag locked", session_id);
        self.emit_written(session_id, required, true);
        Ok(WriteReport {
            bytes: required,
            locked: true,
        })
    }

    /// End the session: finish with `Ok(alert)` or invalidate with the error
    async fn close(
        &mut self,
        session: &mut dyn TagSession,
        session_id: Uuid,
        ending: Result<String, &SessionError>,
    ) {
        match ending {
            Ok(alert) => {
                session.finish(&alert).await;
                info!("Session {} closed: {}", session_id, alert);
                self.events.emit_lossy(TagEvent::SessionClosed {
                    session_id,
                    timestamp: Utc::now(),
                });
            }
            Err(error) => {
                let message = error.to_string();
                session.invalidate(&message).await;
                warn!("Session {} invalidated: {}", session_id, message);
                self.events.emit_lossy(TagEvent::SessionInvalidated {
                    session_id,
                    message,
                    timestamp: Utc::now(),
                });
            }
        }
        self.transition(SessionState::Idle);
    }

    fn publish(&self, session_id: Uuid, context: ScanContext, result: ScanResult) {
        let succeeded = result.is_success();
        match &result {
            ScanResult::Success(observed) => info!(
                "Session {}: {} scan read {} ({}, read-only: {})",
                session_id,
                context,
                observed.identifier.id,
                observed.identifier.role,
                observed.is_read_only
            ),
            ScanResult::Failure(reason) => {
                info!("Session {}: {} scan failed: {}", session_id, context, reason)
            }
        }

        self.results.publish(context, result);
        self.events.emit_lossy(TagEvent::ScanPublished {
            session_id,
            context,
            succeeded,
            timestamp: Utc::now(),
        });
    }

    fn emit_written(&self, session_id: Uuid, bytes: usize, locked: bool) {
        self.events.emit_lossy(TagEvent::TagWritten {
            session_id,
            bytes,
            locked,
            timestamp: Utc::now(),
        });
    }

    fn transition(&mut self, next: SessionState) {
        if !self.state.permits(&next) {
            warn!(
                "Unexpected session transition {} -> {}",
                self.state.phase(),
                next.phase()
            );
        }
        debug!("Session state {} -> {}", self.state.phase(), next.phase());
        self.set_state(next);
    }

    fn set_state(&mut self, next: SessionState) {
        self.state = next;
        self.phase_tx.send_replace(self.state.phase());
    }
}

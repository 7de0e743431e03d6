//! Event types for the QTag session event system
//!
//! Provides shared event definitions and EventBus for every component that
//! observes discovery sessions (UI bindings, logging sinks, tests).

mod session_types;

pub use session_types::{OperationMode, ScanContext, TagCapability};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// QTag session event types
///
/// Events are broadcast via EventBus and can be serialized for any outer
/// transport a host application chooses. Every event carries the id of the
/// discovery session it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TagEvent {
    /// A discovery session was opened
    SessionOpened {
        session_id: Uuid,
        /// Mode the session was opened for (immutable for its lifetime)
        mode: OperationMode,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Hardware reported a tag and its capability
    TagDetected {
        session_id: Uuid,
        capability: TagCapability,
        /// Remaining record capacity in bytes
        capacity: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A read session published its terminal scan result
    ///
    /// Triggers:
    /// - Consumer of `context` reads its mailbox
    ScanPublished {
        session_id: Uuid,
        context: ScanContext,
        succeeded: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Encoded records were written to a tag
    TagWritten {
        session_id: Uuid,
        /// Encoded message length in bytes
        bytes: usize,
        /// Whether the tag was also permanently locked
        locked: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session ended with an invalidation message
    ///
    /// NOTE: A lock failure after a successful write also lands here; the
    /// message names the lock step.
    SessionInvalidated {
        session_id: Uuid,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session ended normally
    SessionClosed {
        session_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl TagEvent {
    /// Get the event type as a string (matches the serde tag)
    pub fn event_type(&self) -> &str {
        match self {
            TagEvent::SessionOpened { .. } => "SessionOpened",
            TagEvent::TagDetected { .. } => "TagDetected",
            TagEvent::ScanPublished { .. } => "ScanPublished",
            TagEvent::TagWritten { .. } => "TagWritten",
            TagEvent::SessionInvalidated { .. } => "SessionInvalidated",
            TagEvent::SessionClosed { .. } => "SessionClosed",
        }
    }

    /// Session the event belongs to
    pub fn session_id(&self) -> Uuid {
        match self {
            TagEvent::SessionOpened { session_id, .. }
            | TagEvent::TagDetected { session_id, .. }
            | TagEvent::ScanPublished { session_id, .. }
            | TagEvent::TagWritten { session_id, .. }
            | TagEvent::SessionInvalidated { session_id, .. }
            | TagEvent::SessionClosed { session_id, .. } => *session_id,
        }
    }
}

/// Central event distribution bus for session events
///
/// Cloning an EventBus yields another handle onto the same channel.
///
/// # Examples
///
/// ```
/// use qtag_common::events::{EventBus, OperationMode, TagEvent};
///
/// let bus = EventBus::new(64);
/// let mut rx = bus.subscribe();
///
/// bus.emit(TagEvent::SessionOpened {
///     session_id: uuid::Uuid::new_v4(),
///     mode: OperationMode::Read,
///     timestamp: chrono::Utc::now(),
/// }).ok();
///
/// assert_eq!(rx.try_recv().unwrap().event_type(), "SessionOpened");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TagEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<TagEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: TagEvent) -> Result<usize, broadcast::error::SendError<TagEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: TagEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opened(session_id: Uuid) -> TagEvent {
        TagEvent::SessionOpened {
            session_id,
            mode: OperationMode::Write,
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_eventbus_new() {
        let bus = EventBus::new(100);
        assert_eq!(bus.capacity(), 100);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_eventbus_subscribe() {
        let bus = EventBus::new(10);
        let _rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_eventbus_emit_without_subscribers_fails() {
        let bus = EventBus::new(10);
        assert!(bus.emit(opened(Uuid::new_v4())).is_err());
    }

    #[test]
    fn test_eventbus_emit_lossy_on_full_channel() {
        let bus = EventBus::new(2);
        let _rx = bus.subscribe(); // Subscribe but don't receive

        for _ in 0..10 {
            bus.emit_lossy(opened(Uuid::new_v4()));
        }

        assert_eq!(bus.capacity(), 2);
    }

    #[test]
    fn test_eventbus_multiple_subscribers() {
        let bus = EventBus::new(10);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        let id = Uuid::new_v4();

        bus.emit(opened(id)).expect("emit should succeed");

        assert_eq!(rx1.try_recv().expect("rx1 should receive").session_id(), id);
        assert_eq!(rx2.try_recv().expect("rx2 should receive").session_id(), id);
    }

    #[test]
    fn test_event_serialization_carries_type_tag() {
        let event = TagEvent::ScanPublished {
            session_id: Uuid::new_v4(),
            context: ScanContext::Diagnostics,
            succeeded: true,
            timestamp: chrono::Utc::now(),
        };

        let json = serde_json::to_string(&event).expect("Event serialization should succeed");
        assert!(json.contains("\"type\":\"ScanPublished\""));
        assert!(json.contains("\"context\":\"Diagnostics\""));

        let back: TagEvent = serde_json::from_str(&json).expect("Event deserialization should succeed");
        assert_eq!(back.event_type(), "ScanPublished");
    }

    #[test]
    fn test_event_type_method() {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();
        let events = vec![
            (opened(id), "SessionOpened"),
            (
                TagEvent::TagDetected {
                    session_id: id,
                    capability: TagCapability::ReadWrite,
                    capacity: 137,
                    timestamp: now,
                },
                "TagDetected",
            ),
            (
                TagEvent::TagWritten {
                    session_id: id,
                    bytes: 48,
                    locked: false,
                    timestamp: now,
                },
                "TagWritten",
            ),
            (
                TagEvent::SessionInvalidated {
                    session_id: id,
                    message: "Tag is not writable".to_string(),
                    timestamp: now,
                },
                "SessionInvalidated",
            ),
            (TagEvent::SessionClosed { session_id: id, timestamp: now }, "SessionClosed"),
        ];

        for (event, expected_type) in events {
            assert_eq!(event.event_type(), expected_type);
            assert_eq!(event.session_id(), id);
        }
    }
}

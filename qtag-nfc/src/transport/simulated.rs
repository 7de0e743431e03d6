//! In-memory proximity hardware
//!
//! Backs the CLI (tag images persisted as JSON) and the test suite. Behaves
//! like the platform primitive where it matters to the controller:
//! - only one session may be active; a second `begin` is rejected
//! - a locked tag reports `ReadOnly` and refuses writes
//! - writes larger than the tag's capacity fail
//!
//! Each step can be made to fail through a [`FaultPlan`], and every call is
//! recorded for inspection.

use super::{TagSession, TagStatus, TagTransport, TransportError};
use crate::codec::NdefMessage;
use crate::error::Result;
use async_trait::async_trait;
use qtag_common::TagCapability;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Capacity of a common 144-byte tag after the capability container
pub const DEFAULT_CAPACITY: usize = 137;

/// Persistent contents and properties of one physical tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagImage {
    pub capability: TagCapability,
    /// Bytes available for an encoded message
    pub capacity: usize,
    #[serde(default)]
    pub locked: bool,
    /// Encoded message bytes
    #[serde(with = "hex", default)]
    pub content: Vec<u8>,
}

impl TagImage {
    /// Writable tag holding an empty message
    pub fn blank(capacity: usize) -> Self {
        Self {
            capability: TagCapability::ReadWrite,
            capacity,
            locked: false,
            content: NdefMessage::empty().to_bytes(),
        }
    }

    /// Factory-locked tag holding `message`
    pub fn read_only(message: &NdefMessage) -> Self {
        let content = message.to_bytes();
        Self {
            capability: TagCapability::ReadOnly,
            capacity: content.len(),
            locked: true,
            content,
        }
    }

    /// Tag without the supported record format
    pub fn unsupported() -> Self {
        Self {
            capability: TagCapability::Unsupported,
            capacity: 0,
            locked: false,
            content: Vec::new(),
        }
    }

    /// Capability the hardware reports, accounting for a lock
    pub fn reported_capability(&self) -> TagCapability {
        match self.capability {
            TagCapability::ReadWrite if self.locked => TagCapability::ReadOnly,
            other => other,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Injected hardware failures, one optional message per step
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    pub reject_begin: Option<String>,
    /// User dismisses the sheet instead of presenting a tag
    pub cancel_detect: bool,
    pub connect: Option<String>,
    pub query_status: Option<String>,
    pub read: Option<String>,
    pub write: Option<String>,
    /// Hold the write acknowledgement this long after the bytes are stored
    pub write_ack_delay: Option<Duration>,
    pub lock: Option<String>,
}

/// Recorded transport interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Begin(String),
    Detect,
    Connect,
    QueryStatus,
    Read,
    /// Message length in bytes
    Write(usize),
    Lock,
    Finish(String),
    Invalidate(String),
}

#[derive(Debug, Default)]
struct Shared {
    tag: Option<TagImage>,
    faults: FaultPlan,
    calls: Vec<TransportCall>,
    active: bool,
}

/// Simulated transport; clones share the same tag and call log
#[derive(Debug, Clone, Default)]
pub struct SimulatedTransport {
    shared: Arc<Mutex<Shared>>,
}

impl SimulatedTransport {
    /// Transport with `tag` already in range
    pub fn new(tag: TagImage) -> Self {
        let transport = Self::default();
        transport.present(tag);
        transport
    }

    /// Transport with no tag in range; `detect` waits until one is presented
    pub fn without_tag() -> Self {
        Self::default()
    }

    pub fn with_faults(self, faults: FaultPlan) -> Self {
        self.set_faults(faults);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        lock_shared(&self.shared)
    }

    pub fn set_faults(&self, faults: FaultPlan) {
        self.lock().faults = faults;
    }

    /// Put a tag in range, replacing any previous one
    pub fn present(&self, tag: TagImage) {
        self.lock().tag = Some(tag);
    }

    /// Current tag contents
    pub fn tag(&self) -> Option<TagImage> {
        self.lock().tag.clone()
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn is_active(&self) -> bool {
        self.lock().active
    }
}

fn lock_shared(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl TagTransport for SimulatedTransport {
    async fn begin(&self, alert: &str) -> std::result::Result<Box<dyn TagSession>, TransportError> {
        let mut shared = self.lock();
        shared.calls.push(TransportCall::Begin(alert.to_string()));

        if let Some(reason) = shared.faults.reject_begin.clone() {
            return Err(TransportError::Rejected(reason));
        }
        if shared.active {
            return Err(TransportError::Rejected(
                "A discovery session is already active".to_string(),
            ));
        }
        shared.active = true;

        Ok(Box::new(SimulatedSession {
            shared: Arc::clone(&self.shared),
            ended: false,
        }))
    }
}

struct SimulatedSession {
    shared: Arc<Mutex<Shared>>,
    ended: bool,
}

impl SimulatedSession {
    /// Record the call and apply its injected fault, if any
    fn step(
        &self,
        call: TransportCall,
        fault: impl FnOnce(&FaultPlan) -> Option<String>,
    ) -> std::result::Result<MutexGuard<'_, Shared>, TransportError> {
        let mut shared = lock_shared(&self.shared);
        shared.calls.push(call);
        match fault(&shared.faults) {
            Some(reason) => Err(TransportError::Io(reason)),
            None => Ok(shared),
        }
    }

    fn end(&mut self, call: TransportCall) {
        let mut shared = lock_shared(&self.shared);
        shared.calls.push(call);
        shared.active = false;
        self.ended = true;
    }
}

fn tag_mut(shared: &mut Shared) -> std::result::Result<&mut TagImage, TransportError> {
    shared
        .tag
        .as_mut()
        .ok_or_else(|| TransportError::Io("Tag connection lost".to_string()))
}

#[async_trait]
impl TagSession for SimulatedSession {
    async fn detect(&mut self) -> std::result::Result<(), TransportError> {
        let (present, cancel) = {
            let mut shared = lock_shared(&self.shared);
            shared.calls.push(TransportCall::Detect);
            (shared.tag.is_some(), shared.faults.cancel_detect)
        };

        if cancel {
            return Err(TransportError::Cancelled);
        }
        if !present {
            // Nothing in range: keep polling until cancelled
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn connect(&mut self) -> std::result::Result<(), TransportError> {
        let mut shared = self.step(TransportCall::Connect, |f| f.connect.clone())?;
        tag_mut(&mut shared).map(|_| ())
    }

    async fn query_status(&mut self) -> std::result::Result<TagStatus, TransportError> {
        let mut shared = self.step(TransportCall::QueryStatus, |f| f.query_status.clone())?;
        let tag = tag_mut(&mut shared)?;
        Ok(TagStatus {
            capability: tag.reported_capability(),
            capacity: tag.capacity,
        })
    }

    async fn read_message(&mut self) -> std::result::Result<NdefMessage, TransportError> {
        let mut shared = self.step(TransportCall::Read, |f| f.read.clone())?;
        let tag = tag_mut(&mut shared)?;
        if tag.capability == TagCapability::Unsupported {
            return Err(TransportError::Io("Tag is not formatted for records".to_string()));
        }
        match NdefMessage::from_bytes(&tag.content) {
            Ok(message) => Ok(message),
            Err(e) => {
                debug!("Simulated tag content unparseable ({}), reporting no records", e);
                Ok(NdefMessage::empty())
            }
        }
    }

    async fn write_message(&mut self, message: &NdefMessage) -> std::result::Result<(), TransportError> {
        let bytes = message.to_bytes();
        let ack_delay = {
            let mut shared = self.step(TransportCall::Write(bytes.len()), |f| f.write.clone())?;
            let ack_delay = shared.faults.write_ack_delay;
            let tag = tag_mut(&mut shared)?;

            if tag.reported_capability() != TagCapability::ReadWrite {
                return Err(TransportError::Io("Tag is read-only".to_string()));
            }
            if bytes.len() > tag.capacity {
                return Err(TransportError::Io("Tag capacity exceeded".to_string()));
            }
            tag.content = bytes;
            ack_delay
        };

        if let Some(delay) = ack_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn write_lock(&mut self) -> std::result::Result<(), TransportError> {
        let mut shared = self.step(TransportCall::Lock, |f| f.lock.clone())?;
        let tag = tag_mut(&mut shared)?;

        if tag.reported_capability() != TagCapability::ReadWrite {
            return Err(TransportError::Io("Tag is already read-only".to_string()));
        }
        tag.locked = true;
        Ok(())
    }

    async fn finish(&mut self, alert: &str) {
        self.end(TransportCall::Finish(alert.to_string()));
    }

    async fn invalidate(&mut self, message: &str) {
        self.end(TransportCall::Invalidate(message.to_string()));
    }
}

impl Drop for SimulatedSession {
    fn drop(&mut self) {
        if !self.ended {
            lock_shared(&self.shared).active = false;
        }
    }
}

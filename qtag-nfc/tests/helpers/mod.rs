//! Shared fixtures for qtag-nfc integration tests
//!
//! - Tag images pre-loaded with encoded identifiers
//! - Controllers wired to a simulated transport
//! - A remote store that records the calls it receives

#![allow(dead_code)]

use async_trait::async_trait;
use qtag_common::config::SessionConfig;
use qtag_nfc::codec::{self, RecordProfile};
use qtag_nfc::transport::simulated::DEFAULT_CAPACITY;
use qtag_nfc::transport::{SimulatedTransport, TagImage, TransportCall};
use qtag_nfc::{Identifier, RemoteStore, Role, TagController};
use serde_json::{json, Value};
use std::sync::Mutex;

/// Writable tag holding `identifier` encoded with the default profile
pub fn tag_with(id: &str, role: Role) -> TagImage {
    let message = codec::encode(&Identifier::new(id, role), &RecordProfile::default());
    let mut image = TagImage::blank(DEFAULT_CAPACITY);
    image.content = message.to_bytes();
    image
}

pub fn controller(transport: &SimulatedTransport) -> TagController<SimulatedTransport> {
    TagController::new(
        transport.clone(),
        RecordProfile::default(),
        SessionConfig::default(),
    )
}

/// True if any write-side primitive reached the hardware
pub fn touched_tag(calls: &[TransportCall]) -> bool {
    calls
        .iter()
        .any(|c| matches!(c, TransportCall::Write(_) | TransportCall::Lock))
}

/// Message the session was invalidated with, if it was
pub fn invalidation(calls: &[TransportCall]) -> Option<String> {
    calls.iter().find_map(|c| match c {
        TransportCall::Invalidate(message) => Some(message.clone()),
        _ => None,
    })
}

/// Remote store that records `complete:<id>` / `detail:<id>` per call
#[derive(Default)]
pub struct RecordingStore {
    calls: Mutex<Vec<String>>,
}

impl RecordingStore {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteStore for RecordingStore {
    async fn complete_slot(&self, id: &str) -> qtag_nfc::Result<()> {
        self.calls.lock().unwrap().push(format!("complete:{}", id));
        Ok(())
    }

    async fn fetch_tag_detail(&self, id: &str) -> qtag_nfc::Result<Value> {
        self.calls.lock().unwrap().push(format!("detail:{}", id));
        Ok(json!({ "item_tag_id": id }))
    }
}

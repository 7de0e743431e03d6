//! # QTag Common Library
//!
//! Shared code for the QTag proximity-tag crates including:
//! - Session event types (TagEvent enum) and the EventBus
//! - Closed enums shared by every session consumer (mode, context, capability)
//! - Configuration loading

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::{EventBus, OperationMode, ScanContext, TagCapability, TagEvent};

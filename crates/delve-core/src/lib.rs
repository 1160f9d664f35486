//! # delve-core
//!
//! Core types and primitives for the Delve exploration runtime.
//! This crate defines the shared vocabulary used by every other crate in the workspace:
//! rooms, drones, commands, writings, the unified error type, and session events.

pub mod error;
pub mod event;
pub mod model;

pub use error::{DelveError, Result};
pub use event::{EventBus, SessionEvent, SessionStats};
pub use model::*;

//! Core types and utilities

pub mod types;
pub mod error;
pub mod logging;
pub mod debug;

pub use types::*;
pub use error::Error;
pub use debug::{DebugEvent, DebugSink, ProbeKind, SharedDebugSink};

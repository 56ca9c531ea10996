//! Cover point records and top-level configuration.

pub mod point;
pub mod config;

pub use point::{CoverCandidate, CoverId, CoverPoint, CoverRecord, NavNodeRef, TileId};
pub use config::CoverConfig;

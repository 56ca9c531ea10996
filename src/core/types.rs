//! Core type aliases and re-exports

pub use glam::{Vec2, Vec3};

/// World up axis. Heights, clearances and drops are measured along it.
pub const UP: Vec3 = Vec3::Y;

/// Standard Result type for the crate
pub type Result<T> = std::result::Result<T, crate::core::error::Error>;

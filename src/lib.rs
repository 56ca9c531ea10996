//! Navcover - procedural cover points over a navigable surface
//!
//! Scans navigation boundary edges for spots next to cover objects or cliff
//! drops, keeps them in a concurrent octree with occupancy flags, and grades
//! them against targets with sphere sweeps.

pub mod core;
pub mod math;
pub mod world;
pub mod cover;
pub mod generation;
pub mod index;
pub mod evaluation;
pub mod system;

pub use cover::{CoverConfig, CoverId, CoverPoint, TileId};
pub use evaluation::{CoverQueryResult, Stance};
pub use system::{CoverSystem, TileOutcome, TileRegenerationWorker, TileUpdateReport};

//! Concurrent spatial index of cover points.
//!
//! [`CoverOctree`] is the single-threaded store; [`CoverIndex`] wraps it in a
//! reader-writer lock and adds the batch, stale-removal and occupancy
//! operations the rest of the system uses.

pub mod octree;
pub mod cover_index;

pub use octree::CoverOctree;
pub use cover_index::{CoverIndex, ReplaceStats};

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

/// Index tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Duplicate radius as a fraction of the generator spacing.
    pub duplicate_radius_factor: f32,
    /// Stale removal covers the generated area scaled by this factor.
    pub stale_area_enlargement: f32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            duplicate_radius_factor: 0.9,
            stale_area_enlargement: 1.25,
        }
    }
}

impl IndexConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.duplicate_radius_factor > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "index duplicate_radius_factor must be positive, got {}",
                self.duplicate_radius_factor
            )));
        }
        if !(self.stale_area_enlargement >= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "index stale_area_enlargement must be at least 1, got {}",
                self.stale_area_enlargement
            )));
        }
        Ok(())
    }
}

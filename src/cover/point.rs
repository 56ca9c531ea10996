//! Cover point records.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::core::types::Vec3;
use crate::world::ActorId;

/// Navigable-surface tile identifier; the unit of batched regeneration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileId(pub u32);

/// Opaque reference to the navigable polygon a cover point was generated from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NavNodeRef(pub u64);

/// Stable handle to a record in the cover index.
///
/// Carries the slot generation, so a handle to a removed record never
/// resolves to a record later stored in the same slot. The epoch changes on
/// every index initialization, so handles also die with the tree they came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CoverId {
    pub(crate) epoch: u32,
    pub(crate) slot: u32,
    pub(crate) generation: u32,
}

/// A cover location produced by the generator, before insertion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoverCandidate {
    /// Object providing the cover.
    pub owner: ActorId,
    pub location: Vec3,
    /// Blocks projectiles but not movement; lean checks are skipped.
    pub force_field: bool,
    /// Tile that generated the point.
    pub tile: TileId,
    pub node: NavNodeRef,
}

/// Stored record. Everything except the occupancy flag is fixed at insert.
#[derive(Debug)]
pub struct CoverRecord {
    pub owner: ActorId,
    pub location: Vec3,
    pub force_field: bool,
    pub tile: TileId,
    pub node: NavNodeRef,
    taken: AtomicBool,
}

impl CoverRecord {
    pub fn new(candidate: &CoverCandidate) -> Self {
        Self {
            owner: candidate.owner,
            location: candidate.location,
            force_field: candidate.force_field,
            tile: candidate.tile,
            node: candidate.node,
            taken: AtomicBool::new(false),
        }
    }

    pub fn is_taken(&self) -> bool {
        self.taken.load(Ordering::Acquire)
    }

    /// Set the taken flag; false if it was already set.
    pub fn try_hold(&self) -> bool {
        self.taken
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Clear the taken flag; false if it was not set.
    pub fn try_release(&self) -> bool {
        self.taken
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Snapshot of a stored record returned by index queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoverPoint {
    pub id: CoverId,
    pub owner: ActorId,
    pub location: Vec3,
    pub force_field: bool,
    pub tile: TileId,
    pub node: NavNodeRef,
    /// Occupancy at the time of the snapshot.
    pub taken: bool,
}

impl CoverPoint {
    pub(crate) fn snapshot(id: CoverId, record: &CoverRecord) -> Self {
        Self {
            id,
            owner: record.owner,
            location: record.location,
            force_field: record.force_field,
            tile: record.tile,
            node: record.node,
            taken: record.is_taken(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> CoverCandidate {
        CoverCandidate {
            owner: ActorId(7),
            location: Vec3::new(1.0, 2.0, 3.0),
            force_field: false,
            tile: TileId(4),
            node: NavNodeRef(9),
        }
    }

    #[test]
    fn test_record_starts_free() {
        let record = CoverRecord::new(&candidate());
        assert!(!record.is_taken());
        assert_eq!(record.location, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(record.tile, TileId(4));
    }

    #[test]
    fn test_hold_release_cycle() {
        let record = CoverRecord::new(&candidate());
        assert!(!record.try_release());
        assert!(record.try_hold());
        assert!(!record.try_hold());
        assert!(record.is_taken());
        assert!(record.try_release());
        assert!(!record.try_release());
    }
}

//! Thread-safe cover index.
//!
//! Mutations that change the set of records (insert, stale removal, explicit
//! removal, lifecycle) take the write lock for their whole duration. Queries
//! and occupancy changes only take the read lock; occupancy is an atomic flag
//! on the record, so holds never wait behind other readers.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::core::debug::{emit, DebugEvent, SharedDebugSink};
use crate::core::types::Vec3;
use crate::cover::{CoverCandidate, CoverConfig, CoverId, CoverPoint, TileId};
use crate::math::Aabb;
use crate::world::{ActorId, ActorQuery};

use super::octree::CoverOctree;
use super::IndexConfig;

/// Counts from one stale removal plus batch insert.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplaceStats {
    pub removed: usize,
    pub inserted: usize,
    /// Candidates matching a record already stored for the tile. The record
    /// stays in place with its id and occupancy.
    pub kept: usize,
    /// Candidates dropped by the duplicate test.
    pub duplicates: usize,
    /// Candidates dropped because their owner died before the insert.
    pub dead_owners: usize,
}

/// Cover index shared between generation workers and cover users.
///
/// Starts uninitialized; every operation fails (returns `None`, `false`, an
/// empty list or zero) until [`CoverIndex::initialize`] is called and after
/// [`CoverIndex::destroy`].
pub struct CoverIndex {
    tree: RwLock<Option<CoverOctree>>,
    /// Bumped by every initialize; stamped into ids of the new tree.
    epoch: AtomicU32,
    config: IndexConfig,
    duplicate_radius: f32,
    debug: Option<SharedDebugSink>,
}

impl CoverIndex {
    pub fn new(config: IndexConfig, duplicate_radius: f32) -> Self {
        Self {
            tree: RwLock::new(None),
            epoch: AtomicU32::new(0),
            config,
            duplicate_radius,
            debug: None,
        }
    }

    pub fn from_config(config: &CoverConfig) -> Self {
        Self::new(config.index.clone(), config.duplicate_radius())
    }

    /// Report rejected duplicates to `sink`.
    pub fn with_debug_sink(mut self, sink: Option<SharedDebugSink>) -> Self {
        self.debug = sink;
        self
    }

    pub fn duplicate_radius(&self) -> f32 {
        self.duplicate_radius
    }

    /// (Re)build an empty tree around `surface_bounds`.
    ///
    /// The root is centered on the bounds with a half-size equal to their
    /// diagonal, so points drifting slightly past the surface still land inside.
    /// Ids handed out before the call no longer resolve.
    pub fn initialize(&self, surface_bounds: &Aabb) {
        let half_size = surface_bounds.size().length().max(1.0);
        let root = Aabb::from_center_half_extent(surface_bounds.center(), Vec3::splat(half_size));
        let mut guard = self.write();
        let epoch = self.epoch.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        *guard = Some(CoverOctree::with_epoch(root, epoch));
        log::info!("Cover index initialized, root half-size {:.0}, epoch {}", half_size, epoch);
    }

    /// Drop every record. Pending writes from in-flight generation are discarded.
    pub fn destroy(&self) {
        if self.write().take().is_some() {
            log::info!("Cover index destroyed");
        }
    }

    pub fn is_valid(&self) -> bool {
        self.read().is_some()
    }

    pub fn len(&self) -> usize {
        self.read().as_ref().map_or(0, CoverOctree::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert one candidate; `None` if it is a duplicate or the index is invalid.
    pub fn insert(&self, candidate: &CoverCandidate) -> Option<CoverId> {
        let mut guard = self.write();
        let tree = guard.as_mut()?;
        let id = self.insert_one(tree, candidate);
        tree.shrink();
        id
    }

    /// Insert a batch with one compaction pass at the end.
    pub fn insert_batch(&self, candidates: &[CoverCandidate]) -> Vec<CoverId> {
        let mut guard = self.write();
        let Some(tree) = guard.as_mut() else {
            return Vec::new();
        };
        let ids = candidates
            .iter()
            .filter_map(|candidate| self.insert_one(tree, candidate))
            .collect();
        tree.shrink();
        ids
    }

    /// Purge stale records around a regenerated tile.
    ///
    /// Only records attributable to another tile whose owner is still alive
    /// survive; everything else inside the enlarged area is removed.
    pub fn remove_stale<A: ActorQuery + ?Sized>(&self, area: &Aabb, tile: TileId, actors: &A) -> usize {
        let mut guard = self.write();
        let Some(tree) = guard.as_mut() else {
            return 0;
        };
        let removed = self.purge(tree, area, tile, actors);
        tree.shrink();
        removed
    }

    /// Stale removal followed by a batch insert, atomically under one write lock.
    ///
    /// A candidate that matches a record already stored for `tile` at the same
    /// location with the same owner keeps that record, so its id and hold
    /// survive the regeneration. Candidates whose owner is no longer alive are
    /// skipped. Returns `None` if the index was destroyed before the update arrived.
    pub fn remove_stale_and_insert<A: ActorQuery + ?Sized>(
        &self,
        area: &Aabb,
        tile: TileId,
        candidates: &[CoverCandidate],
        actors: &A,
    ) -> Option<ReplaceStats> {
        let mut guard = self.write();
        let tree = guard.as_mut()?;

        let mut stats = ReplaceStats::default();
        let mut kept = HashSet::new();
        let mut fresh = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if !actors.is_alive(candidate.owner) {
                stats.dead_owners += 1;
                continue;
            }
            match Self::matching_record(tree, tile, candidate) {
                Some(id) if kept.insert(id) => stats.kept += 1,
                Some(_) => stats.duplicates += 1,
                None => fresh.push(candidate),
            }
        }

        let enlarged = area.enlarged(self.config.stale_area_enlargement);
        stats.removed = tree.retain_in(&enlarged, |id, record| {
            kept.contains(&id) || (record.tile != tile && actors.is_alive(record.owner))
        });
        for candidate in fresh {
            if self.insert_one(tree, candidate).is_some() {
                stats.inserted += 1;
            } else {
                stats.duplicates += 1;
            }
        }
        tree.shrink();

        log::debug!(
            "Tile {:?}: removed {} stale, kept {}, inserted {} ({} duplicates, {} dead owners), {} total",
            tile,
            stats.removed,
            stats.kept,
            stats.inserted,
            stats.duplicates,
            stats.dead_owners,
            tree.len()
        );
        Some(stats)
    }

    /// Remove one record; false for stale ids or an invalid index.
    pub fn remove(&self, id: CoverId) -> bool {
        self.write()
            .as_mut()
            .and_then(|tree| tree.remove(id))
            .is_some()
    }

    /// Remove every record owned by `owner`.
    pub fn remove_owned_by(&self, owner: ActorId) -> usize {
        let mut guard = self.write();
        let Some(tree) = guard.as_mut() else {
            return 0;
        };
        let removed = tree.retain(|record| record.owner != owner);
        tree.shrink();
        removed
    }

    /// Records inside `area`.
    pub fn query_box(&self, area: &Aabb) -> Vec<CoverPoint> {
        let mut out = Vec::new();
        if let Some(tree) = self.read().as_ref() {
            tree.query_box(area, |id, record| out.push(CoverPoint::snapshot(id, record)));
        }
        out
    }

    /// Records within `radius` of `center`.
    pub fn query_sphere(&self, center: Vec3, radius: f32) -> Vec<CoverPoint> {
        let mut out = Vec::new();
        if let Some(tree) = self.read().as_ref() {
            tree.query_sphere(center, radius, |id, record| out.push(CoverPoint::snapshot(id, record)));
        }
        out
    }

    pub fn get(&self, id: CoverId) -> Option<CoverPoint> {
        let guard = self.read();
        let record = guard.as_ref()?.get(id)?;
        Some(CoverPoint::snapshot(id, record))
    }

    /// Record stored at exactly `location`.
    pub fn find_at(&self, location: Vec3) -> Option<CoverPoint> {
        let guard = self.read();
        let tree = guard.as_ref()?;
        let id = tree.find_at(location)?;
        tree.get(id).map(|record| CoverPoint::snapshot(id, record))
    }

    /// Claim a point. Fails if it is already held, the id is stale or the index is invalid.
    pub fn hold_cover(&self, id: CoverId) -> bool {
        self.read()
            .as_ref()
            .and_then(|tree| tree.get(id))
            .is_some_and(|record| record.try_hold())
    }

    /// Give a point back. Fails if it is not held, the id is stale or the index is invalid.
    pub fn release_cover(&self, id: CoverId) -> bool {
        self.read()
            .as_ref()
            .and_then(|tree| tree.get(id))
            .is_some_and(|record| record.try_release())
    }

    fn insert_one(&self, tree: &mut CoverOctree, candidate: &CoverCandidate) -> Option<CoverId> {
        let id = tree.insert(candidate, self.duplicate_radius);
        if id.is_none() {
            emit(&self.debug, || DebugEvent::CandidateRejected { location: candidate.location });
        }
        id
    }

    fn purge<A: ActorQuery + ?Sized>(&self, tree: &mut CoverOctree, area: &Aabb, tile: TileId, actors: &A) -> usize {
        let area = area.enlarged(self.config.stale_area_enlargement);
        tree.retain_in(&area, |_, record| record.tile != tile && actors.is_alive(record.owner))
    }

    /// Record of `tile` stored exactly where `candidate` would go, with the same owner.
    fn matching_record(tree: &CoverOctree, tile: TileId, candidate: &CoverCandidate) -> Option<CoverId> {
        let id = tree.find_at(candidate.location)?;
        let record = tree.get(id)?;
        (record.tile == tile && record.owner == candidate.owner && record.force_field == candidate.force_field)
            .then_some(id)
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<CoverOctree>> {
        self.tree.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<CoverOctree>> {
        self.tree.write().unwrap_or_else(PoisonError::into_inner)
    }
}

//! Cover system façade.
//!
//! Owns the index and the world handle, buffers tile-update notifications,
//! regenerates tiles in parallel and answers cover queries.

pub mod worker;

pub use worker::TileRegenerationWorker;

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::core::types::Vec3;
use crate::core::{Result, SharedDebugSink};
use crate::cover::{CoverConfig, CoverId, CoverPoint, TileId};
use crate::evaluation::{resolve_targets, CoverEvaluator, CoverQueryResult, Stance};
use crate::generation::{scan_tiles, CoverPointGenerator, TileScan};
use crate::index::{CoverIndex, ReplaceStats};
use crate::math::Aabb;
use crate::world::{ActorId, CoverWorld, TargetSource};

/// What happened to one tile update.
#[derive(Clone, Debug, PartialEq)]
pub enum TileOutcome {
    /// Stale records replaced by the new scan.
    Updated(ReplaceStats),
    /// The surface had no edges or bounds for the tile; nothing was written.
    NoSurfaceData,
    /// The index was destroyed before the update could be written.
    IndexInvalid,
    /// The generation task failed.
    Failed(String),
}

/// Result of regenerating one tile.
#[derive(Clone, Debug, PartialEq)]
pub struct TileUpdateReport {
    pub tile: TileId,
    /// Candidates produced by the scan.
    pub candidates: usize,
    pub outcome: TileOutcome,
}

impl TileUpdateReport {
    fn new(tile: TileId, candidates: usize, outcome: TileOutcome) -> Self {
        Self { tile, candidates, outcome }
    }

    pub(crate) fn failed(tile: TileId, reason: String) -> Self {
        Self::new(tile, 0, TileOutcome::Failed(reason))
    }
}

/// A cover point with its aggregate score.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoredCover {
    pub point: CoverPoint,
    pub score: f32,
}

pub struct CoverSystem<W: CoverWorld> {
    world: Arc<W>,
    index: Arc<CoverIndex>,
    config: CoverConfig,
    pending_tiles: Mutex<BTreeSet<TileId>>,
    debug: Option<SharedDebugSink>,
}

impl<W: CoverWorld> CoverSystem<W> {
    /// Validate `config` and build an empty index around the world's surface.
    pub fn new(world: Arc<W>, config: CoverConfig) -> Result<Self> {
        config.validate()?;
        let index = CoverIndex::from_config(&config);
        index.initialize(&world.surface_bounds());
        Ok(Self {
            world,
            index: Arc::new(index),
            config,
            pending_tiles: Mutex::new(BTreeSet::new()),
            debug: None,
        })
    }

    /// Report generator, index and evaluator probes to `sink`.
    ///
    /// Replaces the index, so call it before generating anything.
    pub fn with_debug_sink(mut self, sink: Option<SharedDebugSink>) -> Self {
        let index = CoverIndex::from_config(&self.config).with_debug_sink(sink.clone());
        index.initialize(&self.world.surface_bounds());
        self.index = Arc::new(index);
        self.debug = sink;
        self
    }

    pub fn world(&self) -> &Arc<W> {
        &self.world
    }

    pub fn index(&self) -> &Arc<CoverIndex> {
        &self.index
    }

    pub fn config(&self) -> &CoverConfig {
        &self.config
    }

    /// Skip samples outside `bounds` on the next regeneration.
    pub fn set_map_bounds(&mut self, bounds: Option<Aabb>) {
        self.config.generator.map_bounds = bounds;
    }

    /// Remember changed tiles until [`CoverSystem::on_generation_finished`].
    pub fn on_tiles_updated(&self, tiles: &[TileId]) {
        let mut pending = self.pending();
        pending.extend(tiles.iter().copied());
        log::debug!("{} tiles awaiting cover regeneration", pending.len());
    }

    pub fn pending_tiles(&self) -> Vec<TileId> {
        self.pending().iter().copied().collect()
    }

    /// Regenerate every buffered tile and clear the buffer.
    pub fn on_generation_finished(&self) -> Vec<TileUpdateReport> {
        let tiles: Vec<TileId> = std::mem::take(&mut *self.pending()).into_iter().collect();
        if tiles.is_empty() {
            return Vec::new();
        }
        self.regenerate_tiles(&tiles)
    }

    /// Scan `tiles` in parallel, then apply each scan to the index.
    pub fn regenerate_tiles(&self, tiles: &[TileId]) -> Vec<TileUpdateReport> {
        let scans = scan_tiles(&self.config.generator, &*self.world, tiles, self.debug.clone());
        let mut reports: Vec<TileUpdateReport> = scans.iter().map(|scan| self.apply_scan(scan)).collect();

        for &tile in tiles {
            if !scans.iter().any(|scan| scan.tile == tile) {
                reports.push(TileUpdateReport::new(tile, 0, TileOutcome::NoSurfaceData));
            }
        }
        reports
    }

    /// Scan and apply a single tile on the calling thread.
    pub fn regenerate_tile(&self, tile: TileId) -> TileUpdateReport {
        if !self.index.is_valid() {
            return TileUpdateReport::new(tile, 0, TileOutcome::IndexInvalid);
        }
        let scan = CoverPointGenerator::new(&self.config.generator, &*self.world)
            .with_debug_sink(self.debug.clone())
            .scan_tile(tile);
        match scan {
            Some(scan) => self.apply_scan(&scan),
            None => TileUpdateReport::new(tile, 0, TileOutcome::NoSurfaceData),
        }
    }

    /// Rebuild the index around `bounds` and regenerate `tiles` into it.
    pub fn rebuild(&self, bounds: &Aabb, tiles: &[TileId]) -> Vec<TileUpdateReport> {
        self.index.initialize(bounds);
        self.pending().clear();
        self.regenerate_tiles(tiles)
    }

    /// Drop the index. Queries fail and in-flight updates are discarded.
    pub fn destroy(&self) {
        self.index.destroy();
    }

    /// Cover points within `radius` of `center`.
    pub fn find_cover_points(&self, center: Vec3, radius: f32) -> Vec<CoverPoint> {
        self.index.query_sphere(center, radius)
    }

    /// Cover points inside `area`.
    pub fn find_cover_points_in(&self, area: &Aabb) -> Vec<CoverPoint> {
        self.index.query_box(area)
    }

    /// Evaluate a point against one target. `None` if the target has no eye position.
    pub fn evaluate(&self, point: &CoverPoint, target: ActorId, stance: &Stance) -> Option<CoverQueryResult> {
        let eye = self.world.eye_position(target)?;
        Some(self.evaluator().evaluate_stance(point, stance, target, eye))
    }

    /// Aggregate score of a point against every target of `source`.
    pub fn score<S: TargetSource + ?Sized>(
        &self,
        point: &CoverPoint,
        stance: &Stance,
        source: &S,
        primary: &[ActorId],
    ) -> f32 {
        let targets = resolve_targets(&*self.world, &source.relevant_targets(), primary);
        self.evaluator().score(point, stance, &targets)
    }

    /// Free cover points near `center` that are not rejected by a primary
    /// target, best first.
    pub fn rank_cover<S: TargetSource + ?Sized>(
        &self,
        center: Vec3,
        radius: f32,
        stance: &Stance,
        source: &S,
        primary: &[ActorId],
    ) -> Vec<ScoredCover> {
        let targets = resolve_targets(&*self.world, &source.relevant_targets(), primary);
        let evaluator = self.evaluator();

        let mut ranked: Vec<ScoredCover> = self
            .find_cover_points(center, radius)
            .into_iter()
            .filter(|point| !point.taken)
            .map(|point| ScoredCover { point, score: evaluator.score(&point, stance, &targets) })
            .filter(|scored| scored.score >= 0.0)
            .collect();

        ranked.sort_by(|a, b| {
            b.score.total_cmp(&a.score).then_with(|| {
                let da = a.point.location.distance_squared(center);
                let db = b.point.location.distance_squared(center);
                da.total_cmp(&db)
            })
        });
        ranked
    }

    pub fn hold_cover(&self, id: CoverId) -> bool {
        self.index.hold_cover(id)
    }

    pub fn release_cover(&self, id: CoverId) -> bool {
        self.index.release_cover(id)
    }

    /// Drop every point provided by a destroyed object.
    pub fn remove_owned_by(&self, owner: ActorId) -> usize {
        self.index.remove_owned_by(owner)
    }

    fn evaluator(&self) -> CoverEvaluator<'_, W> {
        CoverEvaluator::from_config(&self.config, &*self.world).with_debug_sink(self.debug.clone())
    }

    fn apply_scan(&self, scan: &TileScan) -> TileUpdateReport {
        let outcome = match self.index.remove_stale_and_insert(&scan.bounds, scan.tile, &scan.candidates, &*self.world) {
            Some(stats) => TileOutcome::Updated(stats),
            None => {
                log::debug!("Index gone, dropping cover update for tile {:?}", scan.tile);
                TileOutcome::IndexInvalid
            }
        };
        TileUpdateReport::new(scan.tile, scan.candidates.len(), outcome)
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, BTreeSet<TileId>> {
        self.pending_tiles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

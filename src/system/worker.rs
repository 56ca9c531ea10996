//! Asynchronous per-tile regeneration.
//!
//! Each requested tile becomes one blocking task on a tokio runtime. At most
//! `max_concurrent` tiles are scanned at a time; finished reports are queued
//! and drained by the caller with [`TileRegenerationWorker::poll_results`].
//! Every requested tile yields exactly one report; a scan that panics is
//! reported as [`TileOutcome::Failed`](super::TileOutcome::Failed).

use std::any::Any;
use std::collections::{HashSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::core::{Error, Result};
use crate::cover::TileId;
use crate::world::CoverWorld;

use super::{CoverSystem, TileUpdateReport};

/// Background tile regeneration for a shared [`CoverSystem`].
pub struct TileRegenerationWorker {
    /// Channel for sending tiles to the worker loop
    request_tx: mpsc::UnboundedSender<TileId>,
    /// Channel for receiving finished updates
    result_rx: mpsc::UnboundedReceiver<TileUpdateReport>,
    /// Tiles requested but not yet reported
    pending: HashSet<TileId>,
    /// Dedicated runtime, if the worker owns one
    _runtime: Option<Runtime>,
}

impl TileRegenerationWorker {
    /// Create a worker with its own multi-threaded runtime.
    pub fn new<W: CoverWorld + 'static>(system: Arc<CoverSystem<W>>, max_concurrent: usize) -> Result<Self> {
        if max_concurrent == 0 {
            return Err(Error::InvalidConfig("worker needs at least one concurrent task".into()));
        }
        let (request_tx, request_rx) = mpsc::unbounded_channel::<TileId>();
        let (result_tx, result_rx) = mpsc::unbounded_channel::<TileUpdateReport>();

        let runtime = Runtime::new()?;
        runtime.spawn(Self::worker_loop(system, max_concurrent, request_rx, result_tx));

        Ok(Self {
            request_tx,
            result_rx,
            pending: HashSet::new(),
            _runtime: Some(runtime),
        })
    }

    /// Create a worker on the current tokio runtime.
    ///
    /// Must be called from inside a runtime context.
    pub fn new_with_current_runtime<W: CoverWorld + 'static>(
        system: Arc<CoverSystem<W>>,
        max_concurrent: usize,
    ) -> Result<Self> {
        if max_concurrent == 0 {
            return Err(Error::InvalidConfig("worker needs at least one concurrent task".into()));
        }
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Runtime(e.to_string()))?;
        let (request_tx, request_rx) = mpsc::unbounded_channel::<TileId>();
        let (result_tx, result_rx) = mpsc::unbounded_channel::<TileUpdateReport>();

        handle.spawn(Self::worker_loop(system, max_concurrent, request_rx, result_tx));

        Ok(Self {
            request_tx,
            result_rx,
            pending: HashSet::new(),
            _runtime: None,
        })
    }

    /// Run requested tiles with bounded concurrency until the request channel closes.
    async fn worker_loop<W: CoverWorld + 'static>(
        system: Arc<CoverSystem<W>>,
        max_concurrent: usize,
        mut request_rx: mpsc::UnboundedReceiver<TileId>,
        result_tx: mpsc::UnboundedSender<TileUpdateReport>,
    ) {
        let mut active_tasks = JoinSet::new();
        let mut queued: VecDeque<TileId> = VecDeque::new();
        let mut accepting = true;

        loop {
            tokio::select! {
                request = request_rx.recv(), if accepting => {
                    match request {
                        Some(tile) => queued.push_back(tile),
                        None => accepting = false,
                    }
                }

                Some(joined) = active_tasks.join_next(), if !active_tasks.is_empty() => {
                    match joined {
                        Ok(report) => {
                            let _ = result_tx.send(report);
                        }
                        // Only reachable on runtime shutdown, panics are caught in the task
                        Err(e) => log::error!("Tile regeneration task did not finish: {}", e),
                    }
                }

                else => {}
            }

            while active_tasks.len() < max_concurrent {
                let Some(tile) = queued.pop_front() else {
                    break;
                };
                let system = Arc::clone(&system);
                active_tasks.spawn_blocking(move || {
                    panic::catch_unwind(AssertUnwindSafe(|| system.regenerate_tile(tile))).unwrap_or_else(|payload| {
                        let reason = panic_message(payload.as_ref());
                        log::error!("Tile {:?} regeneration panicked: {}", tile, reason);
                        TileUpdateReport::failed(tile, reason)
                    })
                });
            }

            if !accepting && queued.is_empty() && active_tasks.is_empty() {
                break;
            }
        }
        log::debug!("Tile regeneration worker stopped");
    }

    /// Queue `tile` for regeneration.
    ///
    /// Returns `false` if the tile is already pending or the worker has stopped.
    pub fn request(&mut self, tile: TileId) -> bool {
        if self.pending.contains(&tile) {
            return false;
        }
        if self.request_tx.send(tile).is_err() {
            log::warn!("Tile regeneration worker is gone, dropping tile {:?}", tile);
            return false;
        }
        self.pending.insert(tile);
        true
    }

    /// Drain finished reports without blocking.
    pub fn poll_results(&mut self) -> Vec<TileUpdateReport> {
        let mut results = Vec::new();
        while let Ok(report) = self.result_rx.try_recv() {
            self.pending.remove(&report.tile);
            results.push(report);
        }
        results
    }

    /// Poll until every pending tile has reported or `timeout` elapses.
    pub fn wait_for_results(&mut self, timeout: Duration) -> Vec<TileUpdateReport> {
        let deadline = Instant::now() + timeout;
        let mut results = self.poll_results();
        while !self.pending.is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
            results.extend(self.poll_results());
        }
        results
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, tile: TileId) -> bool {
        self.pending.contains(&tile)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Vec2, Vec3};
    use crate::cover::CoverConfig;
    use crate::math::Aabb;
    use crate::system::TileOutcome;
    use crate::world::{
        ActorId, ActorQuery, BoundaryEdge, BoxWorld, GeometryTracer, NavSurface, TraceChannel, TraceHit,
    };

    fn corridor() -> BoxWorld {
        let mut world = BoxWorld::new();
        for i in 0..4u32 {
            let x = i as f32 * 200.0;
            world.add_polygon(TileId(i), Vec2::new(x, 0.0), Vec2::new(x + 200.0, 100.0), 0.0);
        }
        world.add_static(Aabb::new(Vec3::new(-50.0, 0.0, 110.0), Vec3::new(850.0, 300.0, 140.0)));
        world
    }

    fn system() -> Arc<CoverSystem<BoxWorld>> {
        Arc::new(CoverSystem::new(Arc::new(corridor()), CoverConfig::default()).unwrap())
    }

    /// Corridor whose navmesh lookup blows up for one tile.
    struct BrokenTile {
        inner: BoxWorld,
        broken: TileId,
    }

    impl NavSurface for BrokenTile {
        fn boundary_edges(&self, tile: TileId) -> Option<Vec<BoundaryEdge>> {
            if tile == self.broken {
                panic!("navmesh tile {:?} is corrupt", tile);
            }
            self.inner.boundary_edges(tile)
        }
        fn project_point(&self, point: Vec3, tolerance: Vec3) -> Option<Vec3> {
            self.inner.project_point(point, tolerance)
        }
        fn tile_bounds(&self, tile: TileId) -> Option<Aabb> {
            self.inner.tile_bounds(tile)
        }
        fn tile_height(&self) -> f32 {
            self.inner.tile_height()
        }
        fn surface_bounds(&self) -> Aabb {
            self.inner.surface_bounds()
        }
    }

    impl GeometryTracer for BrokenTile {
        fn line_trace(&self, start: Vec3, end: Vec3, channel: TraceChannel) -> Option<TraceHit> {
            self.inner.line_trace(start, end, channel)
        }
        fn sweep_sphere(&self, start: Vec3, end: Vec3, radius: f32, channel: TraceChannel) -> Option<TraceHit> {
            self.inner.sweep_sphere(start, end, radius, channel)
        }
    }

    impl ActorQuery for BrokenTile {
        fn is_alive(&self, actor: ActorId) -> bool {
            self.inner.is_alive(actor)
        }
        fn is_mobile_unit(&self, actor: ActorId) -> bool {
            self.inner.is_mobile_unit(actor)
        }
        fn eye_position(&self, actor: ActorId) -> Option<Vec3> {
            self.inner.eye_position(actor)
        }
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        assert!(TileRegenerationWorker::new(system(), 0).is_err());
    }

    #[test]
    fn test_pending_tracking() {
        let mut worker = TileRegenerationWorker::new(system(), 2).unwrap();
        assert!(worker.request(TileId(0)));
        assert!(!worker.request(TileId(0)));
        assert!(worker.is_pending(TileId(0)));
    }

    #[test]
    fn test_all_tiles_report() {
        let system = system();
        let mut worker = TileRegenerationWorker::new(Arc::clone(&system), 2).unwrap();
        for i in 0..4 {
            assert!(worker.request(TileId(i)));
        }
        assert!(worker.request(TileId(9)));

        let reports = worker.wait_for_results(Duration::from_secs(10));
        assert_eq!(reports.len(), 5);
        assert_eq!(worker.pending_count(), 0);

        let updated = reports.iter().filter(|r| matches!(r.outcome, TileOutcome::Updated(_))).count();
        assert_eq!(updated, 4);
        let missing = reports.iter().find(|r| r.tile == TileId(9)).unwrap();
        assert_eq!(missing.outcome, TileOutcome::NoSurfaceData);
        assert!(!system.index().is_empty());
    }

    #[test]
    fn test_panicking_tile_reports_failure() {
        let world = BrokenTile { inner: corridor(), broken: TileId(2) };
        let system = Arc::new(CoverSystem::new(Arc::new(world), CoverConfig::default()).unwrap());
        let mut worker = TileRegenerationWorker::new(Arc::clone(&system), 2).unwrap();
        for i in 0..4 {
            assert!(worker.request(TileId(i)));
        }

        let reports = worker.wait_for_results(Duration::from_secs(10));
        assert_eq!(reports.len(), 4);
        assert_eq!(worker.pending_count(), 0);
        assert!(!worker.is_pending(TileId(2)));

        let broken = reports.iter().find(|r| r.tile == TileId(2)).unwrap();
        match &broken.outcome {
            TileOutcome::Failed(reason) => assert!(reason.contains("corrupt"), "{}", reason),
            other => panic!("unexpected outcome {:?}", other),
        }
        let updated = reports.iter().filter(|r| matches!(r.outcome, TileOutcome::Updated(_))).count();
        assert_eq!(updated, 3);

        // The tile can be requested again once it has reported
        assert!(worker.request(TileId(2)));
    }

    #[test]
    fn test_panic_message_formats() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&7u32), "panic with non-string payload");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_current_runtime_worker() {
        let system = system();
        let mut worker = TileRegenerationWorker::new_with_current_runtime(Arc::clone(&system), 1).unwrap();
        worker.request(TileId(1));

        let deadline = Instant::now() + Duration::from_secs(10);
        let mut reports = Vec::new();
        while reports.is_empty() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
            reports = worker.poll_results();
        }
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].tile, TileId(1));
    }
}

//! Boundary-walking cover point generator.
//!
//! Every boundary edge of a tile is sampled at a fixed spacing. At each
//! sample both horizontal directions perpendicular to the edge are probed:
//! the side must not lead back onto the navigable surface, and past the edge
//! there must be either a standing obstruction at clearance height or a
//! sheer drop.

use crate::core::debug::{emit, DebugEvent, ProbeKind, SharedDebugSink};
use crate::core::types::{UP, Vec3};
use crate::cover::{CoverCandidate, NavNodeRef, TileId};
use crate::math::{horizontal_perpendicular, rotate_about_up, Aabb};
use crate::world::{BoundaryEdge, GeometryTracer, NavSurface, TraceHit};

use super::config::GeneratorConfig;

/// Edges shorter than this have no usable direction.
const MIN_EDGE_LENGTH: f32 = 1e-3;
/// Distance under which the last step counts as landing on the end vertex.
const END_VERTEX_EPSILON: f32 = 1e-3;
/// Extra probe at each end vertex, turned about the up axis.
const CORNER_PROBE_DEGREES: f32 = 45.0;

/// One sample on a boundary edge: lifted position plus the edge direction
/// used for the lateral probes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeSample {
    pub position: Vec3,
    pub direction: Vec3,
}

/// Output of scanning one tile.
#[derive(Clone, Debug)]
pub struct TileScan {
    pub tile: TileId,
    pub candidates: Vec<CoverCandidate>,
    /// Area whose stale records should be replaced by `candidates`.
    pub bounds: Aabb,
}

/// Cover generator over a navigable surface and the geometry around it.
pub struct CoverPointGenerator<'a, W: NavSurface + GeometryTracer + ?Sized> {
    world: &'a W,
    config: &'a GeneratorConfig,
    debug: Option<SharedDebugSink>,
}

impl<'a, W: NavSurface + GeometryTracer + ?Sized> CoverPointGenerator<'a, W> {
    pub fn new(config: &'a GeneratorConfig, world: &'a W) -> Self {
        Self { world, config, debug: None }
    }

    /// Report every probe to `sink`.
    pub fn with_debug_sink(mut self, sink: Option<SharedDebugSink>) -> Self {
        self.debug = sink;
        self
    }

    /// Scan every boundary edge of `tile`.
    ///
    /// Returns `None` when the surface has no edge list or no bounds for the
    /// tile. Scanning does not mutate anything, so repeated scans of the same
    /// world state return the same candidates.
    pub fn scan_tile(&self, tile: TileId) -> Option<TileScan> {
        let edges = self.world.boundary_edges(tile)?;
        let tile_bounds = self.world.tile_bounds(tile)?;

        let mut candidates = Vec::new();
        for edge in &edges {
            self.scan_edge(tile, edge, &mut candidates);
        }

        let tile_height = self.world.tile_height();
        let bounds = if tile_height > 0.0 {
            tile_bounds.expanded_by(UP * tile_height * 0.5)
        } else {
            tile_bounds
        };

        log::debug!(
            "Scanned tile {:?}: {} edges, {} cover candidates",
            tile,
            edges.len(),
            candidates.len()
        );
        emit(&self.debug, || DebugEvent::TileScanned {
            tile,
            bounds,
            candidates: candidates.len(),
        });

        Some(TileScan { tile, candidates, bounds })
    }

    fn scan_edge(&self, tile: TileId, edge: &BoundaryEdge, out: &mut Vec<CoverCandidate>) {
        let Some(samples) = sample_edge(edge, self.config.spacing, self.config.ground_offset) else {
            log::trace!("Skipping degenerate boundary edge {:?}", edge);
            return;
        };

        for sample in samples {
            if let Some(bounds) = &self.config.map_bounds {
                if !bounds.contains_point(sample.position) {
                    continue;
                }
            }
            if let Some(candidate) = self.probe_sample(tile, edge.node, sample) {
                emit(&self.debug, || DebugEvent::CandidateAccepted { location: candidate.location });
                out.push(candidate);
            }
        }
    }

    /// Probe both sides of a sample; the first side that yields cover wins.
    fn probe_sample(&self, tile: TileId, node: NavNodeRef, sample: EdgeSample) -> Option<CoverCandidate> {
        let lateral = horizontal_perpendicular(sample.direction);
        [lateral, -lateral]
            .into_iter()
            .find_map(|side| self.probe_side(tile, node, sample.position, side))
    }

    fn probe_side(&self, tile: TileId, node: NavNodeRef, start: Vec3, side: Vec3) -> Option<CoverCandidate> {
        let cfg = self.config;

        // A short step that lands back on the surface means this side is not
        // an edge of walkable space.
        let hole_probe = start + side * cfg.hole_check_reach;
        let tolerance = Vec3::new(
            cfg.projection_tolerance,
            cfg.ground_offset + cfg.projection_tolerance,
            cfg.projection_tolerance,
        );
        let on_surface = self.world.project_point(hole_probe, tolerance).is_some();
        self.record(ProbeKind::HoleCheck, start, hole_probe, on_surface);
        if on_surface {
            return None;
        }

        let lift = UP * cfg.clearance_height;
        let hit = match self.trace(ProbeKind::CoverTrace, start + lift, start + side * cfg.probe_reach + lift) {
            Some(hit) => hit,
            None => self.probe_cliff(start, hole_probe, side)?,
        };

        Some(CoverCandidate {
            owner: hit.actor,
            location: start,
            force_field: false,
            tile,
            node,
        })
    }

    /// Look for a drop past the edge. On success returns the ground hit under
    /// the sample, whose object owns the cover point.
    fn probe_cliff(&self, start: Vec3, hole_probe: Vec3, side: Vec3) -> Option<TraceHit> {
        let cfg = self.config;
        let cliff_start = hole_probe + side * cfg.cliff_edge_distance;
        let drop_end = cliff_start - UP * cfg.clearance_height;

        if self.trace(ProbeKind::CliffTrace, cliff_start, drop_end).is_some() {
            return None;
        }
        let slanted_end = drop_end + side * cfg.slope_tolerance;
        if self.trace(ProbeKind::SlantedCliffTrace, cliff_start, slanted_end).is_some() {
            return None;
        }

        self.trace(ProbeKind::GroundTrace, start, start - UP * cfg.ground_probe_depth)
    }

    fn trace(&self, kind: ProbeKind, start: Vec3, end: Vec3) -> Option<TraceHit> {
        let hit = self.world.line_trace(start, end, self.config.trace_channel);
        self.record(kind, start, end, hit.is_some());
        hit
    }

    fn record(&self, kind: ProbeKind, start: Vec3, end: Vec3, blocked: bool) {
        emit(&self.debug, || DebugEvent::Probe { kind, start, end, blocked });
    }
}

/// Sample positions along `edge`, lifted by `ground_offset`.
///
/// Steps of `spacing` from the start vertex (the start vertex alone when the
/// edge is shorter than one step), then the end vertex unless the last step
/// already landed on it, then the end vertex again with the direction turned
/// 45 degrees so corners are probed diagonally. `None` for a zero-length edge.
pub fn sample_edge(edge: &BoundaryEdge, spacing: f32, ground_offset: f32) -> Option<Vec<EdgeSample>> {
    let length = edge.length();
    if length < MIN_EDGE_LENGTH || !(spacing > 0.0) {
        return None;
    }
    let direction = (edge.end - edge.start) / length;
    let lift = UP * ground_offset;

    let steps = (length / spacing).floor() as usize;
    let mut samples: Vec<EdgeSample> = (0..=steps)
        .map(|i| EdgeSample {
            position: edge.start + direction * (i as f32 * spacing) + lift,
            direction,
        })
        .collect();

    let end = edge.end + lift;
    let landed_on_end = samples
        .last()
        .is_some_and(|s| s.position.distance(end) <= END_VERTEX_EPSILON);
    if !landed_on_end {
        samples.push(EdgeSample { position: end, direction });
    }
    samples.push(EdgeSample {
        position: end,
        direction: rotate_about_up(direction, CORNER_PROBE_DEGREES),
    });

    Some(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::core::debug::RecordingSink;
    use crate::core::types::Vec2;
    use crate::world::{BoxWorld, TraceChannel};

    /// A single edge with nothing around it: every side is a hole and no
    /// trace ever hits.
    struct OpenEdge(BoundaryEdge);

    impl NavSurface for OpenEdge {
        fn boundary_edges(&self, _tile: TileId) -> Option<Vec<BoundaryEdge>> {
            Some(vec![self.0])
        }
        fn project_point(&self, _point: Vec3, _tolerance: Vec3) -> Option<Vec3> {
            None
        }
        fn tile_bounds(&self, _tile: TileId) -> Option<Aabb> {
            Some(Aabb::new(self.0.start, self.0.end))
        }
        fn tile_height(&self) -> f32 {
            0.0
        }
        fn surface_bounds(&self) -> Aabb {
            Aabb::new(self.0.start, self.0.end)
        }
    }

    impl GeometryTracer for OpenEdge {
        fn line_trace(&self, _start: Vec3, _end: Vec3, _channel: TraceChannel) -> Option<TraceHit> {
            None
        }
        fn sweep_sphere(&self, _start: Vec3, _end: Vec3, _radius: f32, _channel: TraceChannel) -> Option<TraceHit> {
            None
        }
    }

    fn wall_world() -> (BoxWorld, crate::world::ActorId) {
        let mut world = BoxWorld::new();
        world.add_polygon(TileId(1), Vec2::new(0.0, 0.0), Vec2::new(300.0, 100.0), 0.0);
        let wall = world.add_static(Aabb::new(Vec3::new(-50.0, 0.0, 110.0), Vec3::new(350.0, 200.0, 140.0)));
        (world, wall)
    }

    fn config(spacing: f32) -> GeneratorConfig {
        GeneratorConfig { spacing, ..Default::default() }
    }

    #[test]
    fn test_sample_edge_offsets_and_corner() {
        let edge = BoundaryEdge::new(Vec3::ZERO, Vec3::new(300.0, 0.0, 0.0), NavNodeRef(1));
        let samples = sample_edge(&edge, 100.0, 10.0).unwrap();

        let xs: Vec<f32> = samples.iter().map(|s| s.position.x).collect();
        assert_eq!(xs, vec![0.0, 100.0, 200.0, 300.0, 300.0]);
        assert!(samples.iter().all(|s| s.position.y == 10.0));
        assert!(samples[..4].iter().all(|s| s.direction == Vec3::X));

        let corner = samples[4].direction;
        assert!((corner.x - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-5);
        assert!((corner.z + std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-5);
    }

    #[test]
    fn test_sample_short_and_degenerate_edges() {
        let short = BoundaryEdge::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 40.0), NavNodeRef(1));
        let samples = sample_edge(&short, 100.0, 0.0).unwrap();
        let zs: Vec<f32> = samples.iter().map(|s| s.position.z).collect();
        assert_eq!(zs, vec![0.0, 40.0, 40.0]);

        let point = BoundaryEdge::new(Vec3::ONE, Vec3::ONE, NavNodeRef(1));
        assert!(sample_edge(&point, 100.0, 0.0).is_none());
    }

    #[test]
    fn test_every_sample_probes_both_sides() {
        let world = OpenEdge(BoundaryEdge::new(Vec3::ZERO, Vec3::new(300.0, 0.0, 0.0), NavNodeRef(1)));
        let config = config(100.0);
        let sink = Arc::new(RecordingSink::new());
        let generator = CoverPointGenerator::new(&config, &world).with_debug_sink(Some(sink.clone()));

        let scan = generator.scan_tile(TileId(1)).unwrap();
        assert!(scan.candidates.is_empty());

        let hole_checks: Vec<Vec3> = sink
            .take()
            .into_iter()
            .filter_map(|event| match event {
                DebugEvent::Probe { kind: ProbeKind::HoleCheck, start, .. } => Some(start),
                _ => None,
            })
            .collect();
        assert_eq!(hole_checks.len(), 10);
        for x in [0.0, 100.0, 200.0, 300.0] {
            let count = hole_checks.iter().filter(|p| p.x == x).count();
            let expected = if x == 300.0 { 4 } else { 2 };
            assert_eq!(count, expected, "probes at x={}", x);
        }
    }

    #[test]
    fn test_wall_behind_edge_yields_cover() {
        let (world, wall) = wall_world();
        let config = config(100.0);
        let scan = CoverPointGenerator::new(&config, &world).scan_tile(TileId(1)).unwrap();

        assert!(!scan.candidates.is_empty());
        assert!(scan.candidates.iter().all(|c| c.owner == wall));
        assert!(scan.candidates.iter().all(|c| c.location.z == 100.0 && c.location.y == 10.0));
        assert!(scan.candidates.iter().all(|c| c.tile == TileId(1) && !c.force_field));

        let mut xs: Vec<i32> = scan.candidates.iter().map(|c| c.location.x as i32).collect();
        xs.sort();
        xs.dedup();
        assert_eq!(xs, vec![0, 100, 200, 300]);

        // tile bounds grown by half the tile height
        assert_eq!(scan.bounds.min.y, -100.0);
        assert_eq!(scan.bounds.max.y, 100.0);
    }

    #[test]
    fn test_scan_is_idempotent() {
        let (world, _) = wall_world();
        let config = config(60.0);
        let generator = CoverPointGenerator::new(&config, &world);
        let first = generator.scan_tile(TileId(1)).unwrap();
        let second = generator.scan_tile(TileId(1)).unwrap();
        assert_eq!(first.candidates, second.candidates);
        assert_eq!(first.bounds, second.bounds);
    }

    #[test]
    fn test_map_bounds_filter_samples() {
        let (world, _) = wall_world();
        let config = GeneratorConfig {
            spacing: 100.0,
            map_bounds: Some(Aabb::new(Vec3::splat(-1000.0), Vec3::new(150.0, 1000.0, 1000.0))),
            ..Default::default()
        };
        let scan = CoverPointGenerator::new(&config, &world).scan_tile(TileId(1)).unwrap();
        assert!(!scan.candidates.is_empty());
        assert!(scan.candidates.iter().all(|c| c.location.x <= 150.0));
    }

    #[test]
    fn test_sheer_drop_is_cover_owned_by_ground() {
        let mut world = BoxWorld::new();
        world.add_polygon(TileId(1), Vec2::new(0.0, 0.0), Vec2::new(100.0, 100.0), 0.0);
        let slab = world.add_static(Aabb::new(Vec3::new(-2.0, -20.0, -2.0), Vec3::new(102.0, 0.0, 102.0)));

        let config = config(50.0);
        let scan = CoverPointGenerator::new(&config, &world).scan_tile(TileId(1)).unwrap();
        assert!(!scan.candidates.is_empty());
        assert!(scan.candidates.iter().all(|c| c.owner == slab));
    }

    #[test]
    fn test_lower_ground_within_clearance_is_not_a_cliff() {
        let mut world = BoxWorld::new();
        world.add_polygon(TileId(1), Vec2::new(0.0, 0.0), Vec2::new(100.0, 100.0), 0.0);
        world.add_static(Aabb::new(Vec3::new(-2.0, -20.0, -2.0), Vec3::new(102.0, 0.0, 102.0)));
        world.add_static(Aabb::new(Vec3::new(-500.0, -60.0, -500.0), Vec3::new(600.0, -50.0, 600.0)));

        let config = config(50.0);
        let scan = CoverPointGenerator::new(&config, &world).scan_tile(TileId(1)).unwrap();
        assert!(scan.candidates.is_empty());
    }

    /// Points on the far edge (z = 100) of a 300 x 100 ledge, corners excluded.
    fn far_edge_points(world: &BoxWorld) -> usize {
        let config = config(50.0);
        let scan = CoverPointGenerator::new(&config, world).scan_tile(TileId(1)).unwrap();
        scan.candidates
            .iter()
            .filter(|c| (c.location.z - 100.0).abs() < 1e-3 && c.location.x > 20.0 && c.location.x < 280.0)
            .count()
    }

    #[test]
    fn test_sloped_drop_is_not_a_cliff() {
        let mut world = BoxWorld::new();
        world.add_polygon(TileId(1), Vec2::new(0.0, 0.0), Vec2::new(300.0, 100.0), 0.0);
        world.add_static(Aabb::new(Vec3::new(-2.0, -20.0, -2.0), Vec3::new(302.0, 0.0, 102.0)));
        assert!(far_edge_points(&world) > 0);

        // Lower ground starting past the straight-down trace: that trace
        // misses, the slanted one lands on the step at about z = 235.
        world.add_static(Aabb::new(Vec3::new(-50.0, -200.0, 200.0), Vec3::new(350.0, -60.0, 400.0)));
        assert_eq!(far_edge_points(&world), 0);
    }

    #[test]
    fn test_narrow_gap_is_not_an_edge() {
        let mut world = BoxWorld::new();
        world.add_polygon(TileId(1), Vec2::new(0.0, 0.0), Vec2::new(100.0, 100.0), 0.0);
        world.add_polygon(TileId(1), Vec2::new(103.0, 0.0), Vec2::new(200.0, 100.0), 0.0);
        // post standing in the gap, reachable from both facing edges
        world.add_static(Aabb::new(Vec3::new(100.5, 0.0, 0.0), Vec3::new(102.5, 200.0, 100.0)));

        let config = config(50.0);
        let scan = CoverPointGenerator::new(&config, &world).scan_tile(TileId(1)).unwrap();
        let in_gap = scan
            .candidates
            .iter()
            .filter(|c| c.location.x == 100.0 || c.location.x == 103.0)
            .filter(|c| c.location.z > 0.0 && c.location.z < 100.0)
            .count();
        assert_eq!(in_gap, 0);
    }

    #[test]
    fn test_unknown_tile_aborts() {
        let (world, _) = wall_world();
        let config = GeneratorConfig::default();
        assert!(CoverPointGenerator::new(&config, &world).scan_tile(TileId(42)).is_none());
    }
}

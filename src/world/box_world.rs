//! Reference world built from axis-aligned boxes.
//!
//! Colliders are boxes owned by actors; the navigable surface is a set of
//! level rectangles grouped into tiles. Good enough to drive the generator and
//! evaluator end to end without an engine.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use crate::core::types::{UP, Vec2, Vec3};
use crate::cover::{NavNodeRef, TileId};
use crate::math::{Aabb, Ray};

use super::{
    ActorId, ActorQuery, BoundaryEdge, GeometryTracer, NavSurface, TraceChannel, TraceHit,
};

/// Shortest boundary piece kept after removing shared edges.
const MIN_EDGE_LENGTH: f32 = 1e-3;
/// Coordinate slack when matching shared polygon edges.
const EDGE_MATCH_EPSILON: f32 = 1e-3;

/// A box collider owned by an actor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Collider {
    pub actor: ActorId,
    pub bounds: Aabb,
    /// Blocks traces on [`TraceChannel::Cover`].
    pub blocks_cover: bool,
    /// Blocks traces on [`TraceChannel::Visibility`].
    pub blocks_visibility: bool,
}

impl Collider {
    fn blocks(&self, channel: TraceChannel) -> bool {
        match channel {
            TraceChannel::Cover => self.blocks_cover,
            TraceChannel::Visibility => self.blocks_visibility,
        }
    }
}

/// One level rectangle of walkable floor. Each rectangle is its own polygon.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WalkableTile {
    pub tile: TileId,
    pub node: NavNodeRef,
    /// Minimum corner on the XZ plane.
    pub min_xz: Vec2,
    /// Maximum corner on the XZ plane.
    pub max_xz: Vec2,
    /// Floor height.
    pub floor: f32,
}

impl WalkableTile {
    fn contains_xz(&self, x: f32, z: f32, slack: f32) -> bool {
        x >= self.min_xz.x - slack && x <= self.max_xz.x + slack &&
        z >= self.min_xz.y - slack && z <= self.max_xz.y + slack
    }

    fn bounds(&self) -> Aabb {
        Aabb::new(
            Vec3::new(self.min_xz.x, self.floor, self.min_xz.y),
            Vec3::new(self.max_xz.x, self.floor, self.max_xz.y),
        )
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct ActorInfo {
    mobile: bool,
    eye: Option<Vec3>,
}

/// Box-collider world implementing every consumed interface.
#[derive(Debug)]
pub struct BoxWorld {
    colliders: Vec<Collider>,
    polygons: Vec<WalkableTile>,
    tiles: BTreeMap<TileId, Aabb>,
    actors: HashMap<ActorId, ActorInfo>,
    dead: RwLock<HashSet<ActorId>>,
    tile_height: f32,
    next_actor: u64,
    next_node: u64,
}

impl BoxWorld {
    /// Create an empty world with a tile height of 200 units.
    pub fn new() -> Self {
        Self {
            colliders: Vec::new(),
            polygons: Vec::new(),
            tiles: BTreeMap::new(),
            actors: HashMap::new(),
            dead: RwLock::new(HashSet::new()),
            tile_height: 200.0,
            next_actor: 1,
            next_node: 1,
        }
    }

    pub fn with_tile_height(mut self, tile_height: f32) -> Self {
        self.tile_height = tile_height;
        self
    }

    /// Square arena of `tiles_per_side`² tiles, each `tile_size` wide, ringed
    /// by walls. Every other tile has a crate in its middle with the walkable
    /// area cut around it.
    pub fn arena(tiles_per_side: u32, tile_size: f32) -> Self {
        const WALL_GAP: f32 = 10.0;
        const WALL_HEIGHT: f32 = 300.0;
        const CRATE_HEIGHT: f32 = 150.0;
        const CRATE_CLEARANCE: f32 = 10.0;

        let mut world = Self::new();
        let extent = tiles_per_side as f32 * tile_size;
        let thick = 40.0;

        let lo = -WALL_GAP - thick;
        let hi = extent + WALL_GAP + thick;
        for bounds in [
            Aabb::new(Vec3::new(lo, 0.0, lo), Vec3::new(hi, WALL_HEIGHT, -WALL_GAP)),
            Aabb::new(Vec3::new(lo, 0.0, extent + WALL_GAP), Vec3::new(hi, WALL_HEIGHT, hi)),
            Aabb::new(Vec3::new(lo, 0.0, lo), Vec3::new(-WALL_GAP, WALL_HEIGHT, hi)),
            Aabb::new(Vec3::new(extent + WALL_GAP, 0.0, lo), Vec3::new(hi, WALL_HEIGHT, hi)),
        ] {
            world.add_static(bounds);
        }

        for tz in 0..tiles_per_side {
            for tx in 0..tiles_per_side {
                let tile = TileId(tz * tiles_per_side + tx);
                let min = Vec2::new(tx as f32, tz as f32) * tile_size;
                let max = min + Vec2::splat(tile_size);

                if (tx + tz) % 2 == 1 {
                    world.add_polygon(tile, min, max, 0.0);
                    continue;
                }

                let center = (min + max) * 0.5;
                let hole_min = center - Vec2::splat(tile_size * 0.15);
                let hole_max = center + Vec2::splat(tile_size * 0.15);
                world.add_polygon(tile, min, Vec2::new(max.x, hole_min.y), 0.0);
                world.add_polygon(tile, Vec2::new(min.x, hole_max.y), max, 0.0);
                world.add_polygon(tile, Vec2::new(min.x, hole_min.y), Vec2::new(hole_min.x, hole_max.y), 0.0);
                world.add_polygon(tile, Vec2::new(hole_max.x, hole_min.y), Vec2::new(max.x, hole_max.y), 0.0);

                let crate_min = hole_min + Vec2::splat(CRATE_CLEARANCE);
                let crate_max = hole_max - Vec2::splat(CRATE_CLEARANCE);
                world.add_static(Aabb::new(
                    Vec3::new(crate_min.x, 0.0, crate_min.y),
                    Vec3::new(crate_max.x, CRATE_HEIGHT, crate_max.y),
                ));
            }
        }
        world
    }

    fn allocate_actor(&mut self, info: ActorInfo) -> ActorId {
        let id = ActorId(self.next_actor);
        self.next_actor += 1;
        self.actors.insert(id, info);
        id
    }

    /// Add a static solid that blocks every channel (walls, crates, floors).
    pub fn add_static(&mut self, bounds: Aabb) -> ActorId {
        let actor = self.allocate_actor(ActorInfo::default());
        self.colliders.push(Collider {
            actor,
            bounds,
            blocks_cover: true,
            blocks_visibility: true,
        });
        actor
    }

    /// Add a mobile unit. Units block visibility only.
    pub fn add_unit(&mut self, bounds: Aabb, eye: Vec3) -> ActorId {
        let actor = self.allocate_actor(ActorInfo { mobile: true, eye: Some(eye) });
        self.colliders.push(Collider {
            actor,
            bounds,
            blocks_cover: false,
            blocks_visibility: true,
        });
        actor
    }

    /// Add an arbitrary collider for an existing or new actor.
    pub fn add_collider(&mut self, collider: Collider) {
        self.actors.entry(collider.actor).or_default();
        self.next_actor = self.next_actor.max(collider.actor.0 + 1);
        self.colliders.push(collider);
    }

    /// Replace the bounds of every collider owned by `actor`.
    pub fn move_actor(&mut self, actor: ActorId, bounds: Aabb) {
        for collider in self.colliders.iter_mut().filter(|c| c.actor == actor) {
            collider.bounds = bounds;
        }
    }

    /// Mark an actor destroyed. Its colliders stop blocking immediately.
    pub fn despawn(&self, actor: ActorId) {
        self.dead
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(actor);
    }

    /// Register a tile with explicit bounds and no polygons.
    pub fn add_tile(&mut self, tile: TileId, bounds: Aabb) {
        self.tiles.insert(tile, bounds);
    }

    /// Add a walkable rectangle to `tile`, registering the tile if needed.
    pub fn add_polygon(&mut self, tile: TileId, min_xz: Vec2, max_xz: Vec2, floor: f32) -> NavNodeRef {
        let node = NavNodeRef(self.next_node);
        self.next_node += 1;
        let polygon = WalkableTile { tile, node, min_xz, max_xz, floor };
        let bounds = polygon.bounds();
        self.tiles
            .entry(tile)
            .and_modify(|b| *b = b.merged(&bounds))
            .or_insert(bounds);
        self.polygons.push(polygon);
        node
    }

    /// Remove every polygon of `tile`; the tile itself stays known.
    pub fn clear_polygons(&mut self, tile: TileId) {
        self.polygons.retain(|p| p.tile != tile);
    }

    /// Remove a tile and its polygons.
    pub fn remove_tile(&mut self, tile: TileId) {
        self.clear_polygons(tile);
        self.tiles.remove(&tile);
    }

    /// All registered tiles.
    pub fn tile_ids(&self) -> Vec<TileId> {
        self.tiles.keys().copied().collect()
    }

    pub fn colliders(&self) -> &[Collider] {
        &self.colliders
    }

    fn is_dead(&self, actor: ActorId) -> bool {
        self.dead
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&actor)
    }

    /// Nearest blocking collider along `start..end`, each box grown by `radius`.
    fn trace(&self, start: Vec3, end: Vec3, radius: f32, channel: TraceChannel) -> Option<TraceHit> {
        let delta = end - start;
        let length = delta.length();
        let dead = self.dead.read().unwrap_or_else(PoisonError::into_inner);

        let mut best: Option<TraceHit> = None;
        for collider in &self.colliders {
            if !collider.blocks(channel) || dead.contains(&collider.actor) {
                continue;
            }
            let bounds = collider.bounds.expanded_by(Vec3::splat(radius));

            let hit = if length <= f32::EPSILON {
                bounds.contains_point(start).then(|| TraceHit {
                    point: start,
                    actor: collider.actor,
                    normal: UP,
                    distance: 0.0,
                    started_penetrating: true,
                })
            } else {
                let ray = Ray::new(start, delta / length);
                ray.hit_aabb(&bounds)
                    .filter(|h| h.t <= length)
                    .map(|h| TraceHit {
                        point: ray.at(h.t) - h.normal * radius,
                        actor: collider.actor,
                        normal: h.normal,
                        distance: h.t,
                        started_penetrating: h.inside,
                    })
            };

            if let Some(hit) = hit {
                if best.is_none_or(|b| hit.distance < b.distance) {
                    best = Some(hit);
                }
            }
        }
        best
    }

    /// Parts of one polygon side not shared with any other polygon.
    ///
    /// `axis` is 0 for sides running along X (fixed Z) and 1 for sides running along Z.
    fn open_spans(&self, polygon: &WalkableTile, axis: usize, fixed: f32, span: (f32, f32)) -> Vec<(f32, f32)> {
        let mut cuts: Vec<(f32, f32)> = Vec::new();
        for other in &self.polygons {
            if other.node == polygon.node || (other.floor - polygon.floor).abs() > EDGE_MATCH_EPSILON {
                continue;
            }
            let touches = if axis == 0 {
                (other.min_xz.y - fixed).abs() <= EDGE_MATCH_EPSILON
                    || (other.max_xz.y - fixed).abs() <= EDGE_MATCH_EPSILON
            } else {
                (other.min_xz.x - fixed).abs() <= EDGE_MATCH_EPSILON
                    || (other.max_xz.x - fixed).abs() <= EDGE_MATCH_EPSILON
            };
            if touches {
                cuts.push(if axis == 0 {
                    (other.min_xz.x, other.max_xz.x)
                } else {
                    (other.min_xz.y, other.max_xz.y)
                });
            }
        }
        subtract_spans(span, cuts)
    }
}

impl Default for BoxWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Remove every `cut` from `span`, returning the remaining pieces in order.
fn subtract_spans(span: (f32, f32), mut cuts: Vec<(f32, f32)>) -> Vec<(f32, f32)> {
    cuts.sort_by(|a, b| a.0.total_cmp(&b.0));
    let mut pieces = Vec::new();
    let mut cursor = span.0;
    for (lo, hi) in cuts {
        if hi <= cursor || lo >= span.1 {
            continue;
        }
        if lo > cursor {
            pieces.push((cursor, lo.min(span.1)));
        }
        cursor = cursor.max(hi);
    }
    if cursor < span.1 {
        pieces.push((cursor, span.1));
    }
    pieces.retain(|(lo, hi)| hi - lo > MIN_EDGE_LENGTH);
    pieces
}

impl NavSurface for BoxWorld {
    fn boundary_edges(&self, tile: TileId) -> Option<Vec<BoundaryEdge>> {
        if !self.tiles.contains_key(&tile) {
            return None;
        }

        let mut edges = Vec::new();
        for polygon in self.polygons.iter().filter(|p| p.tile == tile) {
            let (x0, z0) = (polygon.min_xz.x, polygon.min_xz.y);
            let (x1, z1) = (polygon.max_xz.x, polygon.max_xz.y);
            let y = polygon.floor;

            for (lo, hi) in self.open_spans(polygon, 0, z0, (x0, x1)) {
                edges.push(BoundaryEdge::new(Vec3::new(lo, y, z0), Vec3::new(hi, y, z0), polygon.node));
            }
            for (lo, hi) in self.open_spans(polygon, 1, x1, (z0, z1)) {
                edges.push(BoundaryEdge::new(Vec3::new(x1, y, lo), Vec3::new(x1, y, hi), polygon.node));
            }
            for (lo, hi) in self.open_spans(polygon, 0, z1, (x0, x1)) {
                edges.push(BoundaryEdge::new(Vec3::new(hi, y, z1), Vec3::new(lo, y, z1), polygon.node));
            }
            for (lo, hi) in self.open_spans(polygon, 1, x0, (z0, z1)) {
                edges.push(BoundaryEdge::new(Vec3::new(x0, y, hi), Vec3::new(x0, y, lo), polygon.node));
            }
        }
        Some(edges)
    }

    fn project_point(&self, point: Vec3, tolerance: Vec3) -> Option<Vec3> {
        self.polygons
            .iter()
            .filter(|p| p.contains_xz(point.x, point.z, tolerance.x.max(tolerance.z)))
            .filter(|p| (point.y - p.floor).abs() <= tolerance.y)
            .min_by(|a, b| (point.y - a.floor).abs().total_cmp(&(point.y - b.floor).abs()))
            .map(|p| {
                Vec3::new(
                    point.x.clamp(p.min_xz.x, p.max_xz.x),
                    p.floor,
                    point.z.clamp(p.min_xz.y, p.max_xz.y),
                )
            })
    }

    fn tile_bounds(&self, tile: TileId) -> Option<Aabb> {
        self.tiles.get(&tile).copied()
    }

    fn tile_height(&self) -> f32 {
        self.tile_height
    }

    fn surface_bounds(&self) -> Aabb {
        let mut bounds: Option<Aabb> = None;
        for tile in self.tiles.values() {
            bounds = Some(match bounds {
                Some(b) => b.merged(tile),
                None => *tile,
            });
        }
        bounds
            .unwrap_or_default()
            .expanded_by(UP * self.tile_height * 0.5)
    }
}

impl GeometryTracer for BoxWorld {
    fn line_trace(&self, start: Vec3, end: Vec3, channel: TraceChannel) -> Option<TraceHit> {
        self.trace(start, end, 0.0, channel)
    }

    fn sweep_sphere(&self, start: Vec3, end: Vec3, radius: f32, channel: TraceChannel) -> Option<TraceHit> {
        self.trace(start, end, radius, channel)
    }
}

impl ActorQuery for BoxWorld {
    fn is_alive(&self, actor: ActorId) -> bool {
        self.actors.contains_key(&actor) && !self.is_dead(actor)
    }

    fn is_mobile_unit(&self, actor: ActorId) -> bool {
        self.actors.get(&actor).is_some_and(|a| a.mobile)
    }

    fn eye_position(&self, actor: ActorId) -> Option<Vec3> {
        if self.is_dead(actor) {
            return None;
        }
        self.actors.get(&actor).and_then(|a| a.eye)
    }
}

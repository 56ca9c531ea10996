//! Interfaces the cover system consumes from the host world.
//!
//! The navigable surface, the collision world and the actor registry are
//! owned elsewhere. The cover system only reads through these traits, so every
//! implementation must be safe to call from worker threads.

pub mod box_world;

pub use box_world::{BoxWorld, Collider, WalkableTile};

use serde::{Deserialize, Serialize};

use crate::core::types::Vec3;
use crate::cover::{NavNodeRef, TileId};
use crate::math::Aabb;

/// Opaque handle to a world object (cover object, unit or target).
///
/// Handles are never dereferenced by the cover system; liveness is asked of
/// [`ActorQuery::is_alive`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub u64);

/// Collision channel a trace runs on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraceChannel {
    /// Only blocked by cover geometry; units do not block it.
    #[default]
    Cover,
    /// Line-of-sight channel; blocked by anything visible.
    Visibility,
}

/// Result of a blocking line trace or sphere sweep.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TraceHit {
    /// Impact point on the blocking surface.
    pub point: Vec3,
    /// Object that blocked the trace.
    pub actor: ActorId,
    /// Surface normal at the impact point.
    pub normal: Vec3,
    /// Distance travelled from the trace start.
    pub distance: f32,
    /// True if the trace started inside the blocking object.
    pub started_penetrating: bool,
}

/// A boundary edge of a navigable polygon: an edge with no neighbouring polygon.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundaryEdge {
    pub start: Vec3,
    pub end: Vec3,
    /// Polygon the edge belongs to.
    pub node: NavNodeRef,
}

impl BoundaryEdge {
    pub fn new(start: Vec3, end: Vec3, node: NavNodeRef) -> Self {
        Self { start, end, node }
    }

    pub fn length(&self) -> f32 {
        self.start.distance(self.end)
    }
}

/// Navigable floor surface, partitioned into tiles.
pub trait NavSurface: Send + Sync {
    /// Boundary edges of every polygon in `tile`, or `None` if the tile is unknown.
    fn boundary_edges(&self, tile: TileId) -> Option<Vec<BoundaryEdge>>;

    /// Project `point` onto the surface within a box of half-extent `tolerance`.
    fn project_point(&self, point: Vec3, tolerance: Vec3) -> Option<Vec3>;

    /// Bounds of `tile`, or `None` if the tile is unknown.
    fn tile_bounds(&self, tile: TileId) -> Option<Aabb>;

    /// Height of a tile along the up axis; zero when the surface has no fixed tile height.
    fn tile_height(&self) -> f32;

    /// Bounds of the whole surface, used to size the cover index.
    fn surface_bounds(&self) -> Aabb;
}

/// Line and sphere queries against world geometry.
pub trait GeometryTracer: Send + Sync {
    /// First blocking hit along the segment `start..end`.
    fn line_trace(&self, start: Vec3, end: Vec3, channel: TraceChannel) -> Option<TraceHit>;

    /// First blocking hit of a sphere of `radius` swept along `start..end`.
    fn sweep_sphere(&self, start: Vec3, end: Vec3, radius: f32, channel: TraceChannel) -> Option<TraceHit>;
}

/// Liveness and classification of world objects.
pub trait ActorQuery: Send + Sync {
    /// Whether the object still exists.
    fn is_alive(&self, actor: ActorId) -> bool;

    /// Whether the object is a mobile unit (pawn). Units never count as cover.
    fn is_mobile_unit(&self, actor: ActorId) -> bool;

    /// Eye position of the object, if it has one.
    fn eye_position(&self, actor: ActorId) -> Option<Vec3>;
}

/// Supplies the objects a cover user wants to hide from.
pub trait TargetSource {
    fn relevant_targets(&self) -> Vec<ActorId>;
}

impl TargetSource for Vec<ActorId> {
    fn relevant_targets(&self) -> Vec<ActorId> {
        self.clone()
    }
}

/// Everything the cover system reads from the host.
pub trait CoverWorld: NavSurface + GeometryTracer + ActorQuery {}

impl<T: NavSurface + GeometryTracer + ActorQuery> CoverWorld for T {}

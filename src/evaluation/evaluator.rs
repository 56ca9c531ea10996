//! Cover point evaluation against a target.

use serde::{Deserialize, Serialize};

use crate::core::debug::{emit, DebugEvent, ProbeKind, SharedDebugSink};
use crate::core::types::{UP, Vec3};
use crate::cover::{CoverConfig, CoverPoint};
use crate::math::{horizontal_direction, horizontal_perpendicular};
use crate::world::{ActorId, ActorQuery, GeometryTracer, TraceChannel, TraceHit};

use super::config::EvaluatorConfig;
use super::result::CoverQueryResult;
use super::scoring::{aggregate_score, CoverTarget, TargetResult};

/// Eye heights of the agent taking cover, measured from the floor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stance {
    pub standing_eye_height: f32,
    /// `None` if the agent cannot crouch.
    pub crouch_eye_height: Option<f32>,
}

impl Default for Stance {
    fn default() -> Self {
        Self {
            standing_eye_height: 152.0,
            crouch_eye_height: Some(90.0),
        }
    }
}

/// Scores cover points with sphere sweeps against the world.
pub struct CoverEvaluator<'a, W: GeometryTracer + ActorQuery + ?Sized> {
    world: &'a W,
    config: &'a EvaluatorConfig,
    /// Lift the generator applied to every point.
    ground_offset: f32,
    debug: Option<SharedDebugSink>,
}

impl<'a, W: GeometryTracer + ActorQuery + ?Sized> CoverEvaluator<'a, W> {
    pub fn new(config: &'a EvaluatorConfig, ground_offset: f32, world: &'a W) -> Self {
        Self { world, config, ground_offset, debug: None }
    }

    pub fn from_config(config: &'a CoverConfig, world: &'a W) -> Self {
        Self::new(&config.evaluator, config.generator.ground_offset, world)
    }

    pub fn with_debug_sink(mut self, sink: Option<SharedDebugSink>) -> Self {
        self.debug = sink;
        self
    }

    /// Evaluate `point` at `eye_height` against one target.
    ///
    /// A sweep runs from the raised point past the target direction. If it
    /// hits the point's own cover object close enough, the point is cover;
    /// with `test_lean` it is only `Found` when the target can be engaged by
    /// leaning out. If it hits nothing, a direct sweep to the target tells an
    /// unrelated obstruction apart from open ground.
    pub fn evaluate_cover_point(
        &self,
        point: &CoverPoint,
        eye_height: f32,
        target: ActorId,
        target_eye: Vec3,
        test_lean: bool,
    ) -> CoverQueryResult {
        let cfg = self.config;
        let raised = self.raise(point.location, eye_height);
        let direction = horizontal_direction(target_eye - raised);
        let end = raised + direction * cfg.max_object_hit_distance * cfg.outward_margin;

        let Some(hit) = self.sweep(ProbeKind::EvaluateSweep, raised, end, cfg.cover_channel) else {
            return match self.sweep(ProbeKind::TargetSweep, raised, target_eye, cfg.cover_channel) {
                Some(hit) if hit.actor != target && !self.world.is_mobile_unit(hit.actor) => {
                    CoverQueryResult::Obstruction
                }
                _ => CoverQueryResult::NotFound,
            };
        };

        let is_cover_object = hit.actor != target
            && !self.world.is_mobile_unit(hit.actor)
            && (point.force_field || hit.actor == point.owner)
            && hit.distance <= cfg.max_object_hit_distance;
        if !is_cover_object {
            return CoverQueryResult::NotFound;
        }

        if point.force_field || !test_lean || self.check_lean(&hit, raised, target, target_eye) {
            CoverQueryResult::Found
        } else {
            CoverQueryResult::FoundNoView
        }
    }

    /// Try leaning to either side of the cover hit.
    ///
    /// A lean position is rejected if a short sweep into it from behind
    /// already hits something. Otherwise it succeeds if the sweep from it to
    /// the target is clear or hits only the target.
    pub fn check_lean(&self, cover_hit: &TraceHit, cover_location: Vec3, target: ActorId, target_eye: Vec3) -> bool {
        let cfg = self.config;
        let offset = horizontal_perpendicular(cover_hit.normal) * cfg.lean_distance;

        [offset, -offset].into_iter().any(|offset| {
            let lean = cover_location + offset;
            let back = lean + cover_hit.normal * cfg.penetration_back_step;
            if let Some(hit) = self.sweep(ProbeKind::LeanPenetration, back, lean, cfg.cover_channel) {
                log::trace!("Lean at {:?} penetrates {:?}", lean, hit.actor);
                return false;
            }
            match self.sweep(ProbeKind::LeanSweep, lean, target_eye, cfg.cover_channel) {
                None => true,
                Some(hit) => hit.actor == target && !hit.started_penetrating,
            }
        })
    }

    /// Evaluate crouched cover.
    ///
    /// The crouched evaluation runs without lean. A `Found` result is then
    /// checked from standing height on the target channel: if something other
    /// than the target blocks that line, the point hides a crouching agent but
    /// gives no view when standing.
    pub fn evaluate_crouch_cover_point(
        &self,
        point: &CoverPoint,
        standing_height: f32,
        crouch_height: f32,
        target: ActorId,
        target_eye: Vec3,
    ) -> CoverQueryResult {
        let result = self.evaluate_cover_point(point, crouch_height, target, target_eye, false);
        if result != CoverQueryResult::Found {
            return result;
        }

        let standing = self.raise(point.location, standing_height);
        match self.sweep(ProbeKind::StandingSweep, standing, target_eye, self.config.target_channel) {
            Some(hit) if hit.actor != target => CoverQueryResult::FoundNoView,
            _ => CoverQueryResult::Found,
        }
    }

    /// Standing evaluation with lean, falling back to crouch when standing
    /// gives no protection. The better of the two results wins.
    pub fn evaluate_stance(&self, point: &CoverPoint, stance: &Stance, target: ActorId, target_eye: Vec3) -> CoverQueryResult {
        let standing = self.evaluate_cover_point(point, stance.standing_eye_height, target, target_eye, true);
        match stance.crouch_eye_height {
            Some(crouch) if standing < CoverQueryResult::FoundNoView => {
                let crouched = self.evaluate_crouch_cover_point(
                    point,
                    stance.standing_eye_height,
                    crouch,
                    target,
                    target_eye,
                );
                standing.max(crouched)
            }
            _ => standing,
        }
    }

    /// Aggregate score of `point` against every target.
    pub fn score(&self, point: &CoverPoint, stance: &Stance, targets: &[CoverTarget]) -> f32 {
        let results: Vec<TargetResult> = targets
            .iter()
            .map(|target| TargetResult {
                result: self.evaluate_stance(point, stance, target.actor, target.eye),
                primary: target.primary,
            })
            .collect();
        aggregate_score(&results)
    }

    fn raise(&self, location: Vec3, eye_height: f32) -> Vec3 {
        location - UP * self.ground_offset + UP * eye_height
    }

    fn sweep(&self, kind: ProbeKind, start: Vec3, end: Vec3, channel: TraceChannel) -> Option<TraceHit> {
        let hit = self.world.sweep_sphere(start, end, self.config.trace_radius, channel);
        emit(&self.debug, || DebugEvent::Probe { kind, start, end, blocked: hit.is_some() });
        hit
    }
}

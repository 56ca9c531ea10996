//! Cover generation parameters.

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::math::Aabb;
use crate::world::TraceChannel;

/// Parameters of the boundary-walking cover generator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Distance between samples along a boundary edge.
    pub spacing: f32,
    /// Length of the clearance-height trace into a surface hole.
    pub probe_reach: f32,
    /// How far past the hole check the cliff trace starts.
    pub cliff_edge_distance: f32,
    /// Outward offset of the slanted cliff trace; rejects sloped ground.
    pub slope_tolerance: f32,
    /// Lateral step used to test whether a side leads back onto the surface.
    /// Kept short so it cannot jump across thin holes.
    pub hole_check_reach: f32,
    /// Height of the smallest agent that has to fit behind cover
    /// (full crouched height, not half height).
    pub clearance_height: f32,
    /// Lift applied to every sample so surface noise does not register as cover.
    pub ground_offset: f32,
    /// Depth of the downward trace that finds the ground object of a cliff edge.
    pub ground_probe_depth: f32,
    /// Horizontal tolerance of the hole-check projection.
    pub projection_tolerance: f32,
    /// Samples outside these bounds are skipped (edge of the map).
    pub map_bounds: Option<Aabb>,
    /// Channel for every generator trace.
    pub trace_channel: TraceChannel,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            spacing: 60.0, // 2x the default lean offset of 30
            probe_reach: 100.0,
            cliff_edge_distance: 70.0,
            slope_tolerance: 100.0,
            hole_check_reach: 5.0,
            clearance_height: 2.0 * 58.0,
            ground_offset: 10.0,
            ground_probe_depth: 30.0,
            projection_tolerance: 0.1,
            map_bounds: None,
            trace_channel: TraceChannel::Cover,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.spacing > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "generator spacing must be positive, got {}", self.spacing
            )));
        }
        let non_negative = [
            ("probe_reach", self.probe_reach),
            ("cliff_edge_distance", self.cliff_edge_distance),
            ("slope_tolerance", self.slope_tolerance),
            ("hole_check_reach", self.hole_check_reach),
            ("clearance_height", self.clearance_height),
            ("ground_offset", self.ground_offset),
            ("ground_probe_depth", self.ground_probe_depth),
            ("projection_tolerance", self.projection_tolerance),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "generator {} must be non-negative, got {}", name, value
                )));
            }
        }
        if let Some(bounds) = self.map_bounds {
            if !bounds.is_valid() {
                return Err(Error::InvalidConfig("generator map_bounds has min > max".into()));
            }
        }
        Ok(())
    }
}

//! Cover evaluation parameters.

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::world::TraceChannel;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// How close the cover object must be to the point to count as cover.
    pub max_object_hit_distance: f32,
    /// Sideways reach when leaning out of cover.
    pub lean_distance: f32,
    /// Radius of every evaluation sweep.
    pub trace_radius: f32,
    /// The outward sweep runs this many times the hit distance.
    pub outward_margin: f32,
    /// Step back from a lean position for the penetration test.
    pub penetration_back_step: f32,
    /// Channel only cover geometry blocks.
    pub cover_channel: TraceChannel,
    /// Line-of-sight channel for the standing check of crouch cover.
    pub target_channel: TraceChannel,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            max_object_hit_distance: 100.0,
            lean_distance: 100.0,
            trace_radius: 5.0,
            outward_margin: 1.5,
            penetration_back_step: 10.0,
            cover_channel: TraceChannel::Cover,
            target_channel: TraceChannel::Visibility,
        }
    }
}

impl EvaluatorConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.max_object_hit_distance > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "evaluator max_object_hit_distance must be positive, got {}",
                self.max_object_hit_distance
            )));
        }
        if !(self.trace_radius > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "evaluator trace_radius must be positive, got {}", self.trace_radius
            )));
        }
        if !(self.outward_margin >= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "evaluator outward_margin must be at least 1, got {}", self.outward_margin
            )));
        }
        if !(self.lean_distance >= 0.0) || !(self.penetration_back_step >= 0.0) {
            return Err(Error::InvalidConfig("evaluator lean distances must be non-negative".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(EvaluatorConfig::default().validate().is_ok());
        let bad = EvaluatorConfig { trace_radius: 0.0, ..Default::default() };
        assert!(bad.validate().is_err());
        let bad = EvaluatorConfig { outward_margin: 0.5, ..Default::default() };
        assert!(bad.validate().is_err());
    }
}

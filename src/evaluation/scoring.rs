//! Multi-target aggregate scoring.

use crate::core::types::Vec3;
use crate::world::{ActorId, ActorQuery};

use super::result::CoverQueryResult;

/// A target with a resolved eye position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoverTarget {
    pub actor: ActorId,
    pub eye: Vec3,
    /// Failing against a primary target rejects the point outright.
    pub primary: bool,
}

/// Result of one point against one target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetResult {
    pub result: CoverQueryResult,
    pub primary: bool,
}

/// Resolve eye positions, dropping targets that have none.
pub fn resolve_targets<A: ActorQuery + ?Sized>(
    actors: &A,
    targets: &[ActorId],
    primary: &[ActorId],
) -> Vec<CoverTarget> {
    targets
        .iter()
        .filter_map(|&actor| match actors.eye_position(actor) {
            Some(eye) => Some(CoverTarget {
                actor,
                eye,
                primary: primary.contains(&actor),
            }),
            None => {
                log::trace!("Target {:?} has no eye position, skipping", actor);
                None
            }
        })
        .collect()
}

/// Combine per-target results into one score.
///
/// * `-1.0` if the point is not `Found` for any primary target.
/// * `1.0` if it is `Found` for any target.
/// * Otherwise `1.0` if the best non-primary result is at least
///   `Obstruction` (the point is still behind something), else `0.0`.
///
/// No targets scores `0.0`.
pub fn aggregate_score(results: &[TargetResult]) -> f32 {
    if results.is_empty() {
        return 0.0;
    }
    if results.iter().any(|r| r.primary && !r.result.is_found()) {
        return -1.0;
    }
    if results.iter().any(|r| r.result.is_found()) {
        return 1.0;
    }
    let best = results.iter().filter(|r| !r.primary).map(|r| r.result).max();
    match best {
        Some(best) if best >= CoverQueryResult::Obstruction => 1.0,
        _ => 0.0,
    }
}

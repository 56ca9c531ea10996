//! Cover evaluation: grades a cover point against targets.

pub mod config;
pub mod evaluator;
pub mod result;
pub mod scoring;

pub use config::EvaluatorConfig;
pub use evaluator::{CoverEvaluator, Stance};
pub use result::CoverQueryResult;
pub use scoring::{aggregate_score, resolve_targets, CoverTarget, TargetResult};

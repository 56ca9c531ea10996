//! Top-level cover system configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::Result;
use crate::evaluation::EvaluatorConfig;
use crate::generation::GeneratorConfig;
use crate::index::IndexConfig;

/// Every tunable of the cover system, loadable from JSON.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverConfig {
    pub generator: GeneratorConfig,
    pub index: IndexConfig,
    pub evaluator: EvaluatorConfig,
}

impl CoverConfig {
    /// Parse from a JSON string. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Write as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.generator.validate()?;
        self.index.validate()?;
        self.evaluator.validate()
    }

    /// Duplicate radius the index applies to a generator batch.
    pub fn duplicate_radius(&self) -> f32 {
        self.generator.spacing * self.index.duplicate_radius_factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Error;

    #[test]
    fn test_defaults_validate() {
        let config = CoverConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.duplicate_radius() - 54.0).abs() < 1e-4);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = CoverConfig::from_json(r#"{ "generator": { "spacing": 100.0 } }"#).unwrap();
        assert_eq!(config.generator.spacing, 100.0);
        assert_eq!(config.generator.probe_reach, GeneratorConfig::default().probe_reach);
        assert_eq!(config.evaluator, EvaluatorConfig::default());
    }

    #[test]
    fn test_invalid_json_values_rejected() {
        let err = CoverConfig::from_json(r#"{ "generator": { "spacing": 0.0 } }"#).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));

        let err = CoverConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover.json");

        let mut config = CoverConfig::default();
        config.evaluator.lean_distance = 45.0;
        config.save(&path).unwrap();

        let loaded = CoverConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }
}

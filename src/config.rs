//! Tunable constants for scoring, augmentation and training

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::BundleError;

/// Weights of the heuristic success score.
///
/// These are empirical and carry no measured derivation, so they live in
/// configuration instead of being baked into the scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicWeights {
    pub lift: f64,
    pub min_confidence: f64,
    pub support: f64,
    pub jaccard: f64,
    pub avg_confidence: f64,
}

impl Default for HeuristicWeights {
    fn default() -> Self {
        Self {
            lift: 0.25,
            min_confidence: 0.25,
            support: 0.20,
            jaccard: 0.15,
            avg_confidence: 0.15,
        }
    }
}

impl HeuristicWeights {
    fn as_array(&self) -> [f64; 5] {
        [
            self.lift,
            self.min_confidence,
            self.support,
            self.jaccard,
            self.avg_confidence,
        ]
    }
}

/// How the minimum-confidence threshold is applied to the two rule directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConfidencePolicy {
    /// A pair qualifies if either direction clears the threshold
    #[default]
    Either,
    /// Both directions must clear the threshold
    Both,
}

/// Parameters of the offline logistic-regression fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub max_iterations: u64,
    /// L2 regularization strength
    pub alpha: f64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            alpha: 1.0,
        }
    }
}

/// Engine-wide configuration, loadable from a JSON file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub weights: HeuristicWeights,
    /// Slope of the logistic squash applied to the weighted heuristic score.
    ///
    /// Past roughly 40 the curve saturates in `f64`; heuristic probabilities
    /// are then pinned one epsilon inside (0, 1) and ties become likely.
    pub squash_steepness: f64,
    /// Score at which the squash yields a probability of 0.5
    pub squash_center: f64,
    /// Added to the cheaper price when computing price ratios
    pub price_epsilon: f64,
    /// Category assigned to items with no known category
    pub unknown_category: String,
    pub confidence_policy: ConfidencePolicy,
    /// Aggregate co-occurrence counts across threads
    pub parallel: bool,
    pub trainer: TrainerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: HeuristicWeights::default(),
            squash_steepness: 5.0,
            squash_center: 0.5,
            price_epsilon: 0.01,
            unknown_category: "Unknown".to_string(),
            confidence_policy: ConfidencePolicy::Either,
            parallel: true,
            trainer: TrainerConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load a configuration file; absent fields take their defaults
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self
            .weights
            .as_array()
            .iter()
            .any(|w| !w.is_finite() || *w < 0.0)
        {
            return Err(BundleError::Config(
                "heuristic weights must be finite and non-negative".to_string(),
            ));
        }
        if !self.squash_steepness.is_finite() || self.squash_steepness <= 0.0 {
            return Err(BundleError::Config(format!(
                "squash_steepness must be positive, got {}",
                self.squash_steepness
            )));
        }
        if !self.squash_center.is_finite() {
            return Err(BundleError::Config("squash_center must be finite".to_string()));
        }
        if !self.price_epsilon.is_finite() || self.price_epsilon <= 0.0 {
            return Err(BundleError::Config(format!(
                "price_epsilon must be positive, got {}",
                self.price_epsilon
            )));
        }
        if self.trainer.max_iterations == 0 {
            return Err(BundleError::Config(
                "trainer.max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.squash_steepness, 5.0);
        assert_eq!(config.confidence_policy, ConfidencePolicy::Either);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"weights": {{"lift": 0.5}}, "confidence_policy": "both"}}"#
        )
        .unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.weights.lift, 0.5);
        assert_eq!(config.weights.support, 0.20);
        assert_eq!(config.confidence_policy, ConfidencePolicy::Both);
        assert_eq!(config.price_epsilon, 0.01);
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut config = EngineConfig::default();
        config.weights.jaccard = -0.1;
        assert!(matches!(config.validate(), Err(BundleError::Config(_))));
    }
}

//! Success-probability scoring with a trained model or the heuristic fallback

use serde::Serialize;

use crate::config::EngineConfig;
use crate::features::BundleCandidate;
use crate::model::{BundleModel, ModelStore};

/// Converts candidate features into success probabilities in [0, 1]
pub trait SuccessScorer {
    /// One probability per candidate, in input order
    fn probabilities(&self, candidates: &[BundleCandidate]) -> crate::Result<Vec<f64>>;
}

impl SuccessScorer for BundleModel {
    fn probabilities(&self, candidates: &[BundleCandidate]) -> crate::Result<Vec<f64>> {
        let features = self.feature_matrix(candidates)?;
        let probabilities = self.predict_proba(&features)?;
        if probabilities.iter().any(|p| !p.is_finite()) {
            return Err(crate::BundleError::model_load("model produced non-finite probabilities"));
        }
        Ok(probabilities.to_vec())
    }
}

/// Weighted, max-normalized association metrics squashed through a logistic curve
#[derive(Debug, Clone)]
pub struct HeuristicScorer {
    weights: [f64; 5],
    steepness: f64,
    center: f64,
}

impl HeuristicScorer {
    pub fn new(config: &EngineConfig) -> Self {
        let w = &config.weights;
        Self {
            weights: [w.lift, w.min_confidence, w.support, w.jaccard, w.avg_confidence],
            steepness: config.squash_steepness,
            center: config.squash_center,
        }
    }

    fn raw_features(candidate: &BundleCandidate) -> [f64; 5] {
        let s = &candidate.stats;
        [
            s.lift,
            s.min_confidence(),
            s.support,
            s.jaccard_similarity,
            s.avg_confidence(),
        ]
    }

    /// Map a weighted score onto (0, 1).
    ///
    /// Steep curves saturate to exactly 0 or 1 in `f64`, so the result is held
    /// one machine epsilon inside the interval.
    pub fn squash(&self, score: f64) -> f64 {
        let p = 1.0 / (1.0 + (-self.steepness * (score - self.center)).exp());
        p.clamp(f64::EPSILON, 1.0 - f64::EPSILON)
    }

    /// Score candidates against the maxima of this candidate set; a feature
    /// whose maximum is not positive contributes 0.
    pub fn score_all(&self, candidates: &[BundleCandidate]) -> Vec<f64> {
        let rows: Vec<[f64; 5]> = candidates.iter().map(Self::raw_features).collect();

        let mut maxima = [0.0_f64; 5];
        for row in &rows {
            for (max, value) in maxima.iter_mut().zip(row) {
                *max = max.max(*value);
            }
        }

        rows.iter()
            .map(|row| {
                let score: f64 = row
                    .iter()
                    .zip(&maxima)
                    .zip(&self.weights)
                    .map(|((value, max), weight)| {
                        let normalized = if *max > 0.0 { value / max } else { 0.0 };
                        normalized * weight
                    })
                    .sum();
                self.squash(score)
            })
            .collect()
    }
}

impl SuccessScorer for HeuristicScorer {
    fn probabilities(&self, candidates: &[BundleCandidate]) -> crate::Result<Vec<f64>> {
        Ok(self.score_all(candidates))
    }
}

/// Which scorer a run uses, chosen once per invocation
#[derive(Debug, Clone)]
pub enum ScoringStrategy {
    Trained(BundleModel),
    Heuristic,
}

impl ScoringStrategy {
    /// Use the stored model when it loads cleanly, otherwise the heuristic
    pub fn select(store: Option<&ModelStore>) -> Self {
        let Some(store) = store else {
            return ScoringStrategy::Heuristic;
        };
        if !store.exists() {
            tracing::info!(path = %store.artifact_path().display(), "no bundle model found, using heuristic scoring");
            return ScoringStrategy::Heuristic;
        }
        match store.load() {
            Ok(model) => {
                tracing::info!(features = ?model.feature_names, "using trained bundle model");
                ScoringStrategy::Trained(model)
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not load bundle model, falling back to heuristic scoring");
                ScoringStrategy::Heuristic
            }
        }
    }

    pub fn is_trained(&self) -> bool {
        matches!(self, ScoringStrategy::Trained(_))
    }
}

/// A candidate with its predicted success probability
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredBundle {
    pub candidate: BundleCandidate,
    pub success_probability: f64,
    /// Whether the probability came from a trained model
    pub model_used: bool,
}

/// Score every candidate. A trained model that fails to apply is logged and
/// replaced by the heuristic, which never fails.
pub fn score_candidates(
    candidates: Vec<BundleCandidate>,
    strategy: &ScoringStrategy,
    config: &EngineConfig,
) -> Vec<ScoredBundle> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let trained = match strategy {
        ScoringStrategy::Trained(model) => match model.probabilities(&candidates) {
            Ok(probabilities) => Some(probabilities),
            Err(e) => {
                tracing::warn!(error = %e, "bundle model failed to score, falling back to heuristic scoring");
                None
            }
        },
        ScoringStrategy::Heuristic => None,
    };

    let model_used = trained.is_some();
    let probabilities = match trained {
        Some(probabilities) => probabilities,
        None => HeuristicScorer::new(config).score_all(&candidates),
    };

    candidates
        .into_iter()
        .zip(probabilities)
        .map(|(candidate, success_probability)| ScoredBundle {
            candidate,
            success_probability,
            model_used,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::PairStatistic;
    use chrono::Utc;

    fn candidate(a: &str, b: &str, support: f64, lift: f64, conf_ab: f64, conf_ba: f64) -> BundleCandidate {
        BundleCandidate::new(PairStatistic {
            item_a: a.to_string(),
            item_b: b.to_string(),
            pair_count: 1,
            support,
            confidence_a_to_b: conf_ab,
            confidence_b_to_a: conf_ba,
            lift,
            jaccard_similarity: support,
            frequency_a: 0.5,
            frequency_b: 0.5,
        })
    }

    fn model(feature_names: &[&str], coefficients: Vec<f64>) -> BundleModel {
        let n = feature_names.len();
        BundleModel {
            feature_names: feature_names.iter().map(|s| s.to_string()).collect(),
            means: vec![0.0; n],
            scales: vec![1.0; n],
            coefficients,
            intercept: 0.0,
            trained_at: Utc::now(),
            n_samples: 10,
            positive_rate: 0.5,
            positive_class: "1".to_string(),
        }
    }

    #[test]
    fn test_heuristic_probabilities_in_open_interval() {
        let candidates = vec![
            candidate("A", "B", 0.5, 1.3, 1.0, 0.66),
            candidate("A", "C", 0.25, 0.7, 0.5, 0.5),
            candidate("B", "C", 0.0, 0.0, 0.0, 0.0),
        ];
        let scored = score_candidates(candidates, &ScoringStrategy::Heuristic, &EngineConfig::default());
        assert_eq!(scored.len(), 3);
        for s in &scored {
            assert!(s.success_probability > 0.0 && s.success_probability < 1.0);
            assert!(!s.model_used);
        }
        assert!(scored[0].success_probability > scored[1].success_probability);
    }

    #[test]
    fn test_heuristic_maximal_candidate() {
        // The only candidate normalizes every feature to 1, so the score is the weight sum.
        let scored = score_candidates(
            vec![candidate("A", "B", 0.5, 1.3, 1.0, 0.8)],
            &ScoringStrategy::Heuristic,
            &EngineConfig::default(),
        );
        let expected = 1.0 / (1.0 + (-5.0_f64 * (1.0 - 0.5)).exp());
        assert!((scored[0].success_probability - expected).abs() < 1e-12);
    }

    #[test]
    fn test_feature_with_zero_maximum_contributes_nothing() {
        let mut strong = candidate("A", "B", 0.5, 2.0, 1.0, 0.5);
        let mut weak = candidate("A", "C", 0.25, 1.0, 0.5, 0.5);
        strong.stats.jaccard_similarity = 0.0;
        weak.stats.jaccard_similarity = 0.0;

        let config = EngineConfig::default();
        let scorer = HeuristicScorer::new(&config);
        let probabilities = scorer.score_all(&[strong, weak]);

        // maxima: lift 2, min confidence 0.5, support 0.5, avg confidence 0.75
        let w = &config.weights;
        let strong_score = w.lift + w.min_confidence + w.support + w.avg_confidence;
        let weak_score = w.lift * 0.5 + w.min_confidence + w.support * 0.5 + w.avg_confidence * (0.5 / 0.75);
        assert!(probabilities.iter().all(|p| p.is_finite()));
        assert!((probabilities[0] - scorer.squash(strong_score)).abs() < 1e-12);
        assert!((probabilities[1] - scorer.squash(weak_score)).abs() < 1e-12);
    }

    #[test]
    fn test_steep_squash_stays_inside_unit_interval() {
        let config = EngineConfig {
            squash_steepness: 100.0,
            ..EngineConfig::default()
        };
        let scorer = HeuristicScorer::new(&config);
        let high = scorer.squash(1.0);
        let low = scorer.squash(0.0);
        assert!(high < 1.0 && high > 0.99);
        assert!(low > 0.0 && low < 0.01);

        let scored = score_candidates(
            vec![candidate("A", "B", 0.5, 1.3, 1.0, 0.8)],
            &ScoringStrategy::Heuristic,
            &config,
        );
        assert!(scored[0].success_probability < 1.0);
    }

    #[test]
    fn test_trained_mode_defaults_missing_features_to_zero() {
        let trained = ScoringStrategy::Trained(model(&["lift", "price_ratio"], vec![1.0, 3.0]));
        let scored = score_candidates(
            vec![candidate("A", "B", 0.5, 2.0, 1.0, 0.5)],
            &trained,
            &EngineConfig::default(),
        );
        let expected = 1.0 / (1.0 + (-2.0_f64).exp());
        assert!(scored[0].model_used);
        assert!((scored[0].success_probability - expected).abs() < 1e-12);
    }

    #[test]
    fn test_broken_model_falls_back_to_heuristic() {
        let broken = ScoringStrategy::Trained(model(&["lift", "support"], vec![1.0]));
        let scored = score_candidates(
            vec![candidate("A", "B", 0.5, 2.0, 1.0, 0.5)],
            &broken,
            &EngineConfig::default(),
        );
        assert!(!scored[0].model_used);
        assert!(scored[0].success_probability > 0.0 && scored[0].success_probability < 1.0);
    }

    #[test]
    fn test_select_without_store_is_heuristic() {
        assert!(!ScoringStrategy::select(None).is_trained());
        let dir = tempfile::tempdir().unwrap();
        assert!(!ScoringStrategy::select(Some(&ModelStore::new(dir.path()))).is_trained());
    }
}

//! Threshold filtering and deterministic top-N selection

use std::cmp::Ordering;

use crate::config::ConfidencePolicy;
use crate::scoring::ScoredBundle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankOptions {
    pub min_support: f64,
    pub min_confidence: f64,
    pub confidence_policy: ConfidencePolicy,
    pub top_n: usize,
}

impl RankOptions {
    fn admits(&self, bundle: &ScoredBundle) -> bool {
        let stats = &bundle.candidate.stats;
        let confidence = match self.confidence_policy {
            ConfidencePolicy::Either => stats.max_confidence(),
            ConfidencePolicy::Both => stats.min_confidence(),
        };
        stats.support >= self.min_support && confidence >= self.min_confidence
    }
}

/// Ranking order: probability, then lift, then pair count, all descending,
/// then the canonical pair key ascending.
pub fn compare_bundles(x: &ScoredBundle, y: &ScoredBundle) -> Ordering {
    let (sx, sy) = (&x.candidate.stats, &y.candidate.stats);
    y.success_probability
        .total_cmp(&x.success_probability)
        .then_with(|| sy.lift.total_cmp(&sx.lift))
        .then_with(|| sy.pair_count.cmp(&sx.pair_count))
        .then_with(|| sx.item_a.cmp(&sy.item_a))
        .then_with(|| sx.item_b.cmp(&sy.item_b))
}

/// Drop candidates below either threshold and keep the best `top_n`
pub fn rank_bundles(scored: Vec<ScoredBundle>, options: &RankOptions) -> Vec<ScoredBundle> {
    let total = scored.len();
    let mut ranked: Vec<ScoredBundle> = scored
        .into_iter()
        .filter(|bundle| options.admits(bundle))
        .collect();

    tracing::debug!(candidates = total, qualifying = ranked.len(), "filtered bundle candidates");

    ranked.sort_by(compare_bundles);
    ranked.truncate(options.top_n);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::BundleCandidate;
    use crate::stats::PairStatistic;

    fn scored(a: &str, b: &str, probability: f64, lift: f64, pair_count: usize, support: f64, conf: (f64, f64)) -> ScoredBundle {
        ScoredBundle {
            candidate: BundleCandidate::new(PairStatistic {
                item_a: a.to_string(),
                item_b: b.to_string(),
                pair_count,
                support,
                confidence_a_to_b: conf.0,
                confidence_b_to_a: conf.1,
                lift,
                jaccard_similarity: 0.1,
                frequency_a: 0.5,
                frequency_b: 0.5,
            }),
            success_probability: probability,
            model_used: false,
        }
    }

    fn options(min_support: f64, min_confidence: f64, top_n: usize) -> RankOptions {
        RankOptions {
            min_support,
            min_confidence,
            confidence_policy: ConfidencePolicy::Either,
            top_n,
        }
    }

    fn keys(ranked: &[ScoredBundle]) -> Vec<(String, String)> {
        ranked
            .iter()
            .map(|b| (b.candidate.stats.item_a.clone(), b.candidate.stats.item_b.clone()))
            .collect()
    }

    #[test]
    fn test_tie_breaks() {
        let input = vec![
            scored("C", "D", 0.7, 1.0, 3, 0.3, (0.5, 0.5)),
            scored("A", "B", 0.7, 1.0, 3, 0.3, (0.5, 0.5)),
            scored("E", "F", 0.7, 1.0, 5, 0.3, (0.5, 0.5)),
            scored("G", "H", 0.7, 2.0, 1, 0.3, (0.5, 0.5)),
            scored("I", "J", 0.9, 0.5, 1, 0.3, (0.5, 0.5)),
        ];
        let ranked = rank_bundles(input, &options(0.0, 0.0, 10));
        let order: Vec<&str> = ranked.iter().map(|b| b.candidate.stats.item_a.as_str()).collect();
        assert_eq!(order, vec!["I", "G", "E", "A", "C"]);
    }

    #[test]
    fn test_thresholds_and_truncation() {
        let input = vec![
            scored("A", "B", 0.9, 1.0, 3, 0.05, (0.9, 0.9)),
            scored("A", "C", 0.8, 1.0, 3, 0.30, (0.05, 0.6)),
            scored("B", "C", 0.7, 1.0, 3, 0.30, (0.1, 0.2)),
            scored("C", "D", 0.6, 1.0, 3, 0.30, (0.5, 0.5)),
        ];
        let ranked = rank_bundles(input.clone(), &options(0.1, 0.5, 10));
        assert_eq!(
            keys(&ranked),
            vec![("A".to_string(), "C".to_string()), ("C".to_string(), "D".to_string())]
        );

        let both = RankOptions {
            confidence_policy: ConfidencePolicy::Both,
            ..options(0.1, 0.5, 10)
        };
        assert_eq!(keys(&rank_bundles(input.clone(), &both)).len(), 1);

        assert_eq!(rank_bundles(input, &options(0.0, 0.0, 2)).len(), 2);
    }

    #[test]
    fn test_nothing_qualifies() {
        let input = vec![scored("A", "B", 0.9, 1.0, 3, 0.5, (1.0, 0.6))];
        assert!(rank_bundles(input, &options(0.9, 0.0, 5)).is_empty());
    }
}

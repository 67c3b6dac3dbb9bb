//! Bundle recommendation entry point tying the pipeline stages together

use polars::prelude::DataFrame;
use serde::Serialize;

use crate::config::EngineConfig;
use crate::data::{build_baskets, item_category_map, item_price_map};
use crate::error::BundleError;
use crate::features::{augment, BundleCandidate};
use crate::model::ModelStore;
use crate::ranker::{rank_bundles, RankOptions};
use crate::scoring::{score_candidates, ScoredBundle, ScoringStrategy};
use crate::stats::{count_cooccurrences, pair_statistics};

/// Column mapping and thresholds for one recommendation run
#[derive(Debug, Clone)]
pub struct BundleRequest {
    pub tx_column: String,
    pub item_column: String,
    pub top_n: usize,
    pub min_support: f64,
    pub min_confidence: f64,
    pub price_column: Option<String>,
    pub category_column: Option<String>,
}

impl BundleRequest {
    pub fn new(tx_column: impl Into<String>, item_column: impl Into<String>) -> Self {
        Self {
            tx_column: tx_column.into(),
            item_column: item_column.into(),
            top_n: 20,
            min_support: 0.001,
            min_confidence: 0.1,
            price_column: None,
            category_column: None,
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        for (name, value) in [
            ("min_support", self.min_support),
            ("min_confidence", self.min_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(BundleError::Config(format!(
                    "{name} must lie in [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// One ranked bundle as handed to presentation layers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BundleRecommendation {
    pub products: String,
    pub item_a: String,
    pub item_b: String,
    pub success_probability: f64,
    pub support: f64,
    pub confidence_a_to_b: f64,
    pub confidence_b_to_a: f64,
    pub lift: f64,
    pub jaccard_similarity: f64,
    pub pair_count: usize,
    pub recommendation_score: f64,
    pub model_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_cross_category: Option<bool>,
}

impl From<ScoredBundle> for BundleRecommendation {
    fn from(bundle: ScoredBundle) -> Self {
        let BundleCandidate {
            stats,
            price,
            category,
        } = bundle.candidate;
        Self {
            products: format!("{} + {}", stats.item_a, stats.item_b),
            success_probability: bundle.success_probability,
            support: stats.support,
            confidence_a_to_b: stats.confidence_a_to_b,
            confidence_b_to_a: stats.confidence_b_to_a,
            lift: stats.lift,
            jaccard_similarity: stats.jaccard_similarity,
            pair_count: stats.pair_count,
            recommendation_score: bundle.success_probability * 100.0,
            model_used: bundle.model_used,
            total_price: price.map(|p| p.total_price),
            is_cross_category: category.map(|c| c.is_cross_category),
            item_a: stats.item_a,
            item_b: stats.item_b,
        }
    }
}

/// Build baskets, count co-occurrences and attach optional features for
/// every pair, without scoring or filtering.
pub fn extract_candidates(
    transactions: &DataFrame,
    request: &BundleRequest,
    config: &EngineConfig,
) -> crate::Result<Vec<BundleCandidate>> {
    let baskets = build_baskets(transactions, &request.tx_column, &request.item_column)?;
    let counts = count_cooccurrences(&baskets, config.parallel);
    let stats = pair_statistics(&counts);
    tracing::debug!(
        baskets = counts.baskets,
        items = counts.item_transactions.len(),
        pairs = stats.len(),
        "aggregated co-occurrences"
    );

    let prices = request
        .price_column
        .as_deref()
        .map(|column| item_price_map(transactions, &request.item_column, column))
        .transpose()?;
    let categories = request
        .category_column
        .as_deref()
        .map(|column| item_category_map(transactions, &request.item_column, column))
        .transpose()?;

    Ok(augment(
        stats,
        prices.as_ref(),
        categories.as_ref(),
        config.price_epsilon,
        &config.unknown_category,
    ))
}

/// Recommend the top bundles in `transactions`.
///
/// Scores with the model in `store` when one loads, otherwise with the
/// heuristic; either way every returned record has the same shape.
///
/// # Arguments
/// * `transactions` - One row per (transaction, item) line
/// * `request` - Column names, thresholds and result count
/// * `store` - Location of a trained model, or `None` to force the heuristic
/// * `config` - Engine constants
///
/// # Returns
/// * Ranked bundles, best first; empty when no pair qualifies
pub fn recommend_bundles(
    transactions: &DataFrame,
    request: &BundleRequest,
    store: Option<&ModelStore>,
    config: &EngineConfig,
) -> crate::Result<Vec<BundleRecommendation>> {
    request.validate()?;
    let candidates = extract_candidates(transactions, request, config)?;
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let strategy = ScoringStrategy::select(store);
    let scored = score_candidates(candidates, &strategy, config);

    let options = RankOptions {
        min_support: request.min_support,
        min_confidence: request.min_confidence,
        confidence_policy: config.confidence_policy,
        top_n: request.top_n,
    };
    let ranked = rank_bundles(scored, &options);

    Ok(ranked.into_iter().map(BundleRecommendation::from).collect())
}

//! Price-compatibility and category-diversity augmentation of pair statistics

use std::collections::BTreeMap;

use serde::Serialize;

use crate::stats::PairStatistic;

/// Every numeric feature a candidate can expose, in export order
pub const EXPORT_FEATURES: &[&str] = &[
    "support",
    "confidence_a_to_b",
    "confidence_b_to_a",
    "lift",
    "frequency_a",
    "frequency_b",
    "pair_count",
    "jaccard_similarity",
    "min_confidence",
    "max_confidence",
    "avg_confidence",
    "price_a",
    "price_b",
    "total_price",
    "price_ratio",
    "is_cross_category",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceFeatures {
    pub price_a: f64,
    pub price_b: f64,
    pub total_price: f64,
    pub price_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryFeatures {
    pub category_a: String,
    pub category_b: String,
    pub is_cross_category: bool,
}

/// A pair statistic plus whichever optional features could be derived
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BundleCandidate {
    pub stats: PairStatistic,
    pub price: Option<PriceFeatures>,
    pub category: Option<CategoryFeatures>,
}

impl BundleCandidate {
    pub fn new(stats: PairStatistic) -> Self {
        Self {
            stats,
            price: None,
            category: None,
        }
    }

    /// Look up a feature by column name; `None` when the candidate lacks it
    pub fn feature(&self, name: &str) -> Option<f64> {
        let s = &self.stats;
        let value = match name {
            "support" => s.support,
            "confidence_a_to_b" => s.confidence_a_to_b,
            "confidence_b_to_a" => s.confidence_b_to_a,
            "lift" => s.lift,
            "frequency_a" => s.frequency_a,
            "frequency_b" => s.frequency_b,
            "pair_count" => s.pair_count as f64,
            "jaccard_similarity" => s.jaccard_similarity,
            "min_confidence" => s.min_confidence(),
            "max_confidence" => s.max_confidence(),
            "avg_confidence" => s.avg_confidence(),
            "price_a" => self.price.as_ref()?.price_a,
            "price_b" => self.price.as_ref()?.price_b,
            "total_price" => self.price.as_ref()?.total_price,
            "price_ratio" => self.price.as_ref()?.price_ratio,
            "is_cross_category" => {
                if self.category.as_ref()?.is_cross_category {
                    1.0
                } else {
                    0.0
                }
            }
            _ => return None,
        };
        Some(value)
    }
}

/// Attach optional price and category features to each pair.
///
/// Items absent from the price map are priced at 0; items absent from the
/// category map fall into `unknown_category`. When a map is not supplied the
/// corresponding features are left off entirely.
pub fn augment(
    stats: Vec<PairStatistic>,
    prices: Option<&BTreeMap<String, f64>>,
    categories: Option<&BTreeMap<String, String>>,
    price_epsilon: f64,
    unknown_category: &str,
) -> Vec<BundleCandidate> {
    stats
        .into_iter()
        .map(|pair| {
            let price = prices.map(|map| {
                let price_a = map.get(&pair.item_a).copied().unwrap_or(0.0);
                let price_b = map.get(&pair.item_b).copied().unwrap_or(0.0);
                price_features(price_a, price_b, price_epsilon)
            });

            let category = categories.map(|map| {
                let lookup = |item: &str| {
                    map.get(item)
                        .cloned()
                        .unwrap_or_else(|| unknown_category.to_string())
                };
                let category_a = lookup(&pair.item_a);
                let category_b = lookup(&pair.item_b);
                CategoryFeatures {
                    is_cross_category: category_a != category_b,
                    category_a,
                    category_b,
                }
            });

            BundleCandidate {
                stats: pair,
                price,
                category,
            }
        })
        .collect()
}

fn price_features(price_a: f64, price_b: f64, epsilon: f64) -> PriceFeatures {
    PriceFeatures {
        price_a,
        price_b,
        total_price: price_a + price_b,
        price_ratio: price_a.max(price_b) / (price_a.min(price_b) + epsilon),
    }
}

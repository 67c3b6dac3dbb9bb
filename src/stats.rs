//! Item and pair co-occurrence counting with association-rule statistics

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use serde::Serialize;

use crate::data::Baskets;

/// Unordered item pair, stored with `item_a < item_b`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey {
    pub item_a: String,
    pub item_b: String,
}

impl PairKey {
    /// Canonicalize two items into a pair key regardless of argument order
    pub fn new(x: &str, y: &str) -> Self {
        let (item_a, item_b) = if x <= y { (x, y) } else { (y, x) };
        Self {
            item_a: item_a.to_string(),
            item_b: item_b.to_string(),
        }
    }
}

/// Partial tallies over a subset of baskets.
///
/// Partials built independently can be combined with [`CooccurrenceCounts::merge`];
/// the combine is associative and commutative, so the reduction order never
/// changes the result.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CooccurrenceCounts {
    /// Number of baskets observed
    pub baskets: usize,
    /// Transactions containing each item
    pub item_transactions: BTreeMap<String, BTreeSet<String>>,
    pub pair_counts: BTreeMap<PairKey, usize>,
}

impl CooccurrenceCounts {
    /// Add one basket's contribution
    pub fn observe(&mut self, tx_id: &str, items: &BTreeSet<String>) {
        self.baskets += 1;
        for item in items {
            self.item_transactions
                .entry(item.clone())
                .or_default()
                .insert(tx_id.to_string());
        }

        let items: Vec<&String> = items.iter().collect();
        for (i, a) in items.iter().enumerate() {
            for b in &items[i + 1..] {
                *self.pair_counts.entry(PairKey::new(a, b)).or_insert(0) += 1;
            }
        }
    }

    pub fn merge(mut self, other: CooccurrenceCounts) -> CooccurrenceCounts {
        self.baskets += other.baskets;
        for (item, transactions) in other.item_transactions {
            self.item_transactions
                .entry(item)
                .or_default()
                .extend(transactions);
        }
        for (pair, count) in other.pair_counts {
            *self.pair_counts.entry(pair).or_insert(0) += count;
        }
        self
    }

    /// Number of baskets containing `item`
    pub fn item_count(&self, item: &str) -> usize {
        self.item_transactions.get(item).map_or(0, BTreeSet::len)
    }

    pub fn pair_count(&self, x: &str, y: &str) -> usize {
        self.pair_counts
            .get(&PairKey::new(x, y))
            .copied()
            .unwrap_or(0)
    }
}

/// Association statistics for one unordered pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairStatistic {
    pub item_a: String,
    pub item_b: String,
    pub pair_count: usize,
    pub support: f64,
    pub confidence_a_to_b: f64,
    pub confidence_b_to_a: f64,
    pub lift: f64,
    pub jaccard_similarity: f64,
    /// Marginal support of `item_a`
    pub frequency_a: f64,
    /// Marginal support of `item_b`
    pub frequency_b: f64,
}

impl PairStatistic {
    pub fn key(&self) -> PairKey {
        PairKey {
            item_a: self.item_a.clone(),
            item_b: self.item_b.clone(),
        }
    }

    pub fn min_confidence(&self) -> f64 {
        self.confidence_a_to_b.min(self.confidence_b_to_a)
    }

    pub fn max_confidence(&self) -> f64 {
        self.confidence_a_to_b.max(self.confidence_b_to_a)
    }

    pub fn avg_confidence(&self) -> f64 {
        (self.confidence_a_to_b + self.confidence_b_to_a) / 2.0
    }
}

/// Tally items and pairs across all baskets.
///
/// With `parallel` set, each rayon worker folds its share of baskets into a
/// private partial and the partials are reduced afterwards.
pub fn count_cooccurrences(baskets: &Baskets, parallel: bool) -> CooccurrenceCounts {
    if parallel {
        baskets
            .par_iter()
            .fold(CooccurrenceCounts::default, |mut acc, (tx_id, items)| {
                acc.observe(tx_id, items);
                acc
            })
            .reduce(CooccurrenceCounts::default, CooccurrenceCounts::merge)
    } else {
        baskets
            .iter()
            .fold(CooccurrenceCounts::default(), |mut acc, (tx_id, items)| {
                acc.observe(tx_id, items);
                acc
            })
    }
}

/// Derive statistics for every co-occurring pair, ordered by pair key.
///
/// An empty basket set yields an empty table. Any ratio whose denominator is
/// zero is defined as 0.
pub fn pair_statistics(counts: &CooccurrenceCounts) -> Vec<PairStatistic> {
    if counts.baskets == 0 {
        return Vec::new();
    }
    let total = counts.baskets as f64;

    counts
        .pair_counts
        .iter()
        .map(|(key, &pair_count)| {
            let count_a = counts.item_count(&key.item_a);
            let count_b = counts.item_count(&key.item_b);
            let joint = pair_count as f64;

            let support = joint / total;
            let frequency_a = count_a as f64 / total;
            let frequency_b = count_b as f64 / total;
            let expected = frequency_a * frequency_b;
            // an item appears at most once per basket, so |A ∩ B| is the pair count
            let union = count_a + count_b - pair_count;

            PairStatistic {
                item_a: key.item_a.clone(),
                item_b: key.item_b.clone(),
                pair_count,
                support,
                confidence_a_to_b: ratio(joint, count_a as f64),
                confidence_b_to_a: ratio(joint, count_b as f64),
                lift: ratio(support, expected),
                jaccard_similarity: ratio(joint, union as f64),
                frequency_a,
                frequency_b,
            }
        })
        .collect()
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

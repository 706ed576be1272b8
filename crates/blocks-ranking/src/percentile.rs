//! Percentile Ranker: cross-sectional 0–100 ranks per metric.
//!
//! ## Algorithm (frozen)
//! 1. Copy the column and sort it ascending (`HigherIsBetter`) or descending
//!    (`LowerIsBetter`) so that better values land at the high end.
//! 2. For each original value: `round(first_index / max(n - 1, 1) * 100)`.
//!
//! Duplicates take the index of their FIRST occurrence in the sorted copy,
//! so every duplicate shares the lowest percentile of its group. This is not
//! tie-averaging and must stay that way: leaderboards rendered from older
//! batches depend on it.
//!
//! ## Missing Values
//! `NullPolicy::Zero` (the default) ranks a missing value as literal 0.0.
//! That conflates "reports zero" with "no data"; `NullPolicy::Floor` ranks
//! present values among themselves and pins missing entries to percentile 0.
//! Non-finite values are treated as missing. `-0.0` ranks as `0.0`.

use blocks_metrics::{CatalogError, Direction, EntityBatch, MetricCatalog, MetricKey};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

/// Percentile for a single-entity batch and for missing values under `Floor`.
pub const FLOOR_PERCENTILE: u8 = 0;

/// How missing metric values enter the ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullPolicy {
    /// Missing values are ranked as 0.0.
    #[default]
    Zero,
    /// Missing values are excluded from the ranking and receive percentile 0.
    Floor,
}

/// Rank a column under the default null-as-zero policy.
pub fn rank(values: &[Option<f64>], direction: Direction) -> Vec<u8> {
    rank_with_policy(values, direction, NullPolicy::Zero)
}

/// Rank a column under an explicit null policy.
///
/// Output has the same length and order as `values`.
pub fn rank_with_policy(
    values: &[Option<f64>],
    direction: Direction,
    policy: NullPolicy,
) -> Vec<u8> {
    // `+ 0.0` folds -0.0 into 0.0 so the two rank as one value.
    let finite = values
        .iter()
        .map(|v| v.filter(|x| x.is_finite()).map(|x| x + 0.0));

    match policy {
        NullPolicy::Zero => {
            let filled: Vec<f64> = finite.map(|v| v.unwrap_or(0.0)).collect();
            rank_dense(&filled, direction)
        }
        NullPolicy::Floor => {
            let column: Vec<Option<f64>> = finite.collect();
            let present: Vec<f64> = column.iter().flatten().copied().collect();
            let mut present_ranks = rank_dense(&present, direction).into_iter();
            column
                .iter()
                .map(|v| match v {
                    Some(_) => present_ranks.next().unwrap_or(FLOOR_PERCENTILE),
                    None => FLOOR_PERCENTILE,
                })
                .collect()
        }
    }
}

/// Core ranking over a column with no gaps.
fn rank_dense(values: &[f64], direction: Direction) -> Vec<u8> {
    if values.is_empty() {
        return Vec::new();
    }

    let mut sorted = values.to_vec();
    match direction {
        Direction::HigherIsBetter => sorted.sort_by(|a, b| a.total_cmp(b)),
        Direction::LowerIsBetter => sorted.sort_by(|a, b| b.total_cmp(a)),
    }

    let denominator = (sorted.len() - 1).max(1) as f64;

    values
        .iter()
        .map(|v| {
            let first_index = match direction {
                Direction::HigherIsBetter => {
                    sorted.partition_point(|s| s.total_cmp(v) == Ordering::Less)
                }
                Direction::LowerIsBetter => {
                    sorted.partition_point(|s| s.total_cmp(v) == Ordering::Greater)
                }
            };
            (first_index as f64 / denominator * 100.0).round() as u8
        })
        .collect()
}

// =============================================================================
// Percentile Table
// =============================================================================

/// `entity -> (metric -> percentile)` for one batch.
///
/// Built in one pass by `rank_batch`; there is no API to patch it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PercentileTable {
    metrics: Vec<MetricKey>,
    entities: Vec<String>,
    ranks: BTreeMap<String, BTreeMap<MetricKey, u8>>,
}

impl PercentileTable {
    /// Metrics that were ranked, in request order.
    pub fn metrics(&self) -> &[MetricKey] {
        &self.metrics
    }

    pub fn contains_metric(&self, key: MetricKey) -> bool {
        self.metrics.contains(&key)
    }

    /// Entity ids in batch order.
    pub fn entities(&self) -> &[String] {
        &self.entities
    }

    pub fn get(&self, id: &str, key: MetricKey) -> Option<u8> {
        self.ranks.get(id).and_then(|m| m.get(&key)).copied()
    }

    pub fn entity(&self, id: &str) -> Option<&BTreeMap<MetricKey, u8>> {
        self.ranks.get(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Rows in batch order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeMap<MetricKey, u8>)> {
        self.entities
            .iter()
            .filter_map(|id| self.ranks.get(id).map(|m| (id.as_str(), m)))
    }
}

/// Rank every requested metric column of a batch.
///
/// Fails before computing anything if a metric has no spec in `catalog`.
pub fn rank_batch(
    batch: &EntityBatch,
    metrics: &[MetricKey],
    catalog: &MetricCatalog,
    policy: NullPolicy,
) -> Result<PercentileTable, CatalogError> {
    let mut ranked: Vec<(MetricKey, Direction)> = Vec::with_capacity(metrics.len());
    for key in metrics {
        let direction = catalog.direction(*key)?;
        if !ranked.iter().any(|(k, _)| k == key) {
            ranked.push((*key, direction));
        }
    }

    let entities: Vec<String> = batch.iter().map(|r| r.id.clone()).collect();
    let mut ranks: BTreeMap<String, BTreeMap<MetricKey, u8>> = entities
        .iter()
        .map(|id| (id.clone(), BTreeMap::new()))
        .collect();

    for (key, direction) in &ranked {
        let column = batch.column(*key);
        let percentiles = rank_with_policy(&column, *direction, policy);
        for (id, pct) in entities.iter().zip(percentiles) {
            if let Some(row) = ranks.get_mut(id) {
                row.insert(*key, pct);
            }
        }
    }

    debug!(
        entities = entities.len(),
        metrics = ranked.len(),
        ?policy,
        "Percentile table computed"
    );

    Ok(PercentileTable {
        metrics: ranked.into_iter().map(|(k, _)| k).collect(),
        entities,
        ranks,
    })
}

// =============================================================================
// Tests
// =============================================================================


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_extremes_get_zero_and_hundred(values in prop::collection::btree_set(-10_000i64..10_000, 2..40)) {
            let column: Vec<Option<f64>> = values.iter().map(|v| Some(*v as f64)).collect();
            let ranks = rank(&column, Direction::HigherIsBetter);
            // btree_set iterates ascending
            prop_assert_eq!(ranks[0], 0);
            prop_assert_eq!(ranks[ranks.len() - 1], 100);

            let reversed = rank(&column, Direction::LowerIsBetter);
            prop_assert_eq!(reversed[0], 100);
            prop_assert_eq!(reversed[reversed.len() - 1], 0);
        }

        #[test]
        fn prop_output_len_and_range(values in prop::collection::vec(prop::option::of(-1e6f64..1e6), 0..50)) {
            let ranks = rank(&values, Direction::HigherIsBetter);
            prop_assert_eq!(ranks.len(), values.len());
            prop_assert!(ranks.iter().all(|r| *r <= 100));
        }

        #[test]
        fn prop_equal_values_share_percentile(values in prop::collection::vec(0i64..5, 1..30)) {
            let column: Vec<Option<f64>> = values.iter().map(|v| Some(*v as f64)).collect();
            let ranks = rank(&column, Direction::HigherIsBetter);
            for i in 0..values.len() {
                for j in 0..values.len() {
                    if values[i] == values[j] {
                        prop_assert_eq!(ranks[i], ranks[j]);
                    }
                }
            }
        }
    }
}

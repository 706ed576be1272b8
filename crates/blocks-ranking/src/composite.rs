//! Composite Scorer: weighted sum of percentile ranks and leaderboard order.
//!
//! ## Rules
//! - `score = round(Σ weight_i * percentile_i)`
//! - Weights are used as given; they are never renormalised
//! - Stable sort descending by score, ranks 1..N by position, so equal scores
//!   keep input order (identical inputs always render identically)
//! - A weighted metric missing from the percentile table is a configuration
//!   error, raised before any score is computed

use crate::percentile::PercentileTable;
use blocks_metrics::{EntityBatch, MetricKey};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

// =============================================================================
// Weighting
// =============================================================================

/// One `(metric, weight)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricWeight {
    pub metric: MetricKey,
    pub weight: f64,
}

/// Ordered weighting over percentile columns.
///
/// Callers are responsible for weights summing to 1.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompositeWeighting {
    weights: Vec<MetricWeight>,
}

impl CompositeWeighting {
    pub fn new(weights: Vec<MetricWeight>) -> Self {
        Self { weights }
    }

    /// Build from `(metric, weight)` pairs.
    pub fn from_pairs(pairs: &[(MetricKey, f64)]) -> Self {
        Self {
            weights: pairs
                .iter()
                .map(|(metric, weight)| MetricWeight {
                    metric: *metric,
                    weight: *weight,
                })
                .collect(),
        }
    }

    /// Equal weights over the magic-formula pair.
    pub fn magic_formula() -> Self {
        Self::from_pairs(&[
            (MetricKey::ReturnOnCapital, 0.5),
            (MetricKey::EarningsYield, 0.5),
        ])
    }

    pub fn weights(&self) -> &[MetricWeight] {
        &self.weights
    }

    pub fn metrics(&self) -> Vec<MetricKey> {
        self.weights.iter().map(|w| w.metric).collect()
    }

    pub fn weight_sum(&self) -> f64 {
        self.weights.iter().map(|w| w.weight).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

// =============================================================================
// Leaderboard
// =============================================================================

/// One scored entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub id: String,
    pub score: i64,
    /// 1-based position after the stable descending sort.
    pub rank: usize,
}

/// Entities in rank order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaderboard {
    rows: Vec<LeaderboardRow>,
}

impl Leaderboard {
    pub fn rows(&self) -> &[LeaderboardRow] {
        &self.rows
    }

    pub fn top(&self, n: usize) -> &[LeaderboardRow] {
        &self.rows[..n.min(self.rows.len())]
    }

    pub fn get(&self, id: &str) -> Option<&LeaderboardRow> {
        self.rows.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<LeaderboardRow> {
        self.rows
    }
}

// =============================================================================
// Scoring
// =============================================================================

/// Score every entity of `batch` and assign leaderboard ranks.
pub fn score(
    batch: &EntityBatch,
    table: &PercentileTable,
    weighting: &CompositeWeighting,
) -> Result<Leaderboard, ScoringError> {
    if weighting.is_empty() {
        return Err(ScoringError::EmptyWeighting);
    }
    for w in weighting.weights() {
        if !table.contains_metric(w.metric) {
            return Err(ScoringError::UnrankedMetric { metric: w.metric });
        }
    }

    let weight_sum = weighting.weight_sum();
    if (weight_sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        warn!(weight_sum, "Composite weights do not sum to 1.0; scores are not renormalised");
    }

    let mut rows: Vec<LeaderboardRow> = Vec::with_capacity(batch.len());
    for entity in batch {
        let mut total = 0.0;
        for w in weighting.weights() {
            let pct = table
                .get(&entity.id, w.metric)
                .ok_or_else(|| ScoringError::MissingEntity {
                    id: entity.id.clone(),
                })?;
            total += w.weight * f64::from(pct);
        }
        rows.push(LeaderboardRow {
            id: entity.id.clone(),
            score: total.round() as i64,
            rank: 0,
        });
    }

    // Vec::sort_by is stable: equal scores keep batch order.
    rows.sort_by(|a, b| b.score.cmp(&a.score));
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = i + 1;
    }

    debug!(entities = rows.len(), metrics = weighting.weights().len(), "Composite scores computed");

    Ok(Leaderboard { rows })
}

/// Scoring configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoringError {
    #[error("Weighting references metric '{metric}' which is not in the percentile table")]
    UnrankedMetric { metric: MetricKey },

    #[error("Weighting is empty")]
    EmptyWeighting,

    #[error("Entity '{id}' has no percentile row; table was built from a different batch")]
    MissingEntity { id: String },
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::percentile::{NullPolicy, rank_batch};
    use blocks_metrics::{EntityRow, MetricCatalog};

    fn batch() -> EntityBatch {
        EntityBatch::new(vec![
            EntityRow::new("AAA")
                .with(MetricKey::ReturnOnCapital, 0.10)
                .with(MetricKey::EarningsYield, 0.02),
            EntityRow::new("BBB")
                .with(MetricKey::ReturnOnCapital, 0.40)
                .with(MetricKey::EarningsYield, 0.09),
            EntityRow::new("CCC")
                .with(MetricKey::ReturnOnCapital, 0.25)
                .with(MetricKey::EarningsYield, 0.05),
        ])
        .unwrap()
    }

    fn table(batch: &EntityBatch) -> PercentileTable {
        rank_batch(
            batch,
            &[MetricKey::ReturnOnCapital, MetricKey::EarningsYield],
            &MetricCatalog::builtin(),
            NullPolicy::Zero,
        )
        .unwrap()
    }

    #[test]
    fn test_score_orders_descending() {
        let batch = batch();
        let board = score(&batch, &table(&batch), &CompositeWeighting::magic_formula()).unwrap();

        let ids: Vec<_> = board.rows().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["BBB", "CCC", "AAA"]);
        assert_eq!(board.get("BBB").unwrap().score, 100);
        assert_eq!(board.get("CCC").unwrap().score, 50);
        assert_eq!(board.get("AAA").unwrap().score, 0);
        assert_eq!(
            board.rows().iter().map(|r| r.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_scores_within_bounds_for_unit_weights() {
        let batch = batch();
        let weighting = CompositeWeighting::from_pairs(&[
            (MetricKey::ReturnOnCapital, 0.7),
            (MetricKey::EarningsYield, 0.3),
        ]);
        let board = score(&batch, &table(&batch), &weighting).unwrap();
        assert!(board.rows().iter().all(|r| (0..=100).contains(&r.score)));
    }

    #[test]
    fn test_equal_scores_keep_input_order() {
        let batch = EntityBatch::new(vec![
            EntityRow::new("Z").with(MetricKey::GrossMargin, 30.0),
            EntityRow::new("Y").with(MetricKey::GrossMargin, 50.0),
            EntityRow::new("X").with(MetricKey::GrossMargin, 30.0),
        ])
        .unwrap();
        let table = rank_batch(
            &batch,
            &[MetricKey::GrossMargin],
            &MetricCatalog::builtin(),
            NullPolicy::Zero,
        )
        .unwrap();
        let weighting = CompositeWeighting::from_pairs(&[(MetricKey::GrossMargin, 1.0)]);

        let board = score(&batch, &table, &weighting).unwrap();
        let ids: Vec<_> = board.rows().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["Y", "Z", "X"]);
        assert_eq!(board.get("Z").unwrap().score, board.get("X").unwrap().score);
        assert_eq!(board.get("Z").unwrap().rank, 2);
        assert_eq!(board.get("X").unwrap().rank, 3);

        // Identical inputs, identical output.
        assert_eq!(score(&batch, &table, &weighting).unwrap(), board);
    }

    #[test]
    fn test_unranked_metric_is_config_error() {
        let batch = batch();
        let weighting = CompositeWeighting::from_pairs(&[
            (MetricKey::ReturnOnCapital, 0.5),
            (MetricKey::PeRatio, 0.5),
        ]);
        let err = score(&batch, &table(&batch), &weighting).unwrap_err();
        assert_eq!(
            err,
            ScoringError::UnrankedMetric {
                metric: MetricKey::PeRatio
            }
        );
        assert!(err.to_string().contains("pe_ratio"));
    }

    #[test]
    fn test_empty_weighting_rejected() {
        let batch = batch();
        let err = score(&batch, &table(&batch), &CompositeWeighting::default()).unwrap_err();
        assert_eq!(err, ScoringError::EmptyWeighting);
    }

    #[test]
    fn test_weights_not_renormalised() {
        let batch = batch();
        let weighting = CompositeWeighting::from_pairs(&[(MetricKey::ReturnOnCapital, 2.0)]);
        let board = score(&batch, &table(&batch), &weighting).unwrap();
        assert_eq!(board.get("BBB").unwrap().score, 200);
    }

    #[test]
    fn test_top_clamps() {
        let batch = batch();
        let board = score(&batch, &table(&batch), &CompositeWeighting::magic_formula()).unwrap();
        assert_eq!(board.top(2).len(), 2);
        assert_eq!(board.top(10).len(), 3);
    }
}

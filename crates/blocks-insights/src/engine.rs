//! Insight Rule Engine: runs the battery and orders the output.
//!
//! ## Ordering (frozen)
//! 1. actionable before informational
//! 2. confidence descending
//! 3. otherwise rule-evaluation order (stable sort)
//!
//! The list is then truncated to `max_insights`. The UI renders it as
//! returned, without re-sorting.

use crate::insight::Insight;
use crate::rules::{InsightRule, no_data_insight};
use crate::stats::DerivedStats;
use crate::thresholds::InsightThresholds;
use blocks_metrics::EntityBatch;
use tracing::{debug, info};

/// Generate insights for a batch with explicit thresholds.
pub fn generate(
    batch: &EntityBatch,
    stats: &DerivedStats,
    thresholds: &InsightThresholds,
) -> Vec<Insight> {
    if batch.is_empty() {
        info!("Empty batch: returning no-data insight");
        return vec![no_data_insight()];
    }

    let mut insights: Vec<Insight> = Vec::new();
    for rule in InsightRule::ALL {
        match rule.evaluate(batch, stats, thresholds) {
            Some(insight) => {
                debug!(rule = rule.id(), tickers = insight.tickers.len(), "Insight rule fired");
                insights.push(insight);
            }
            None => debug!(rule = rule.id(), "Insight rule silent"),
        }
    }

    sort_insights(&mut insights);
    let generated = insights.len();
    insights.truncate(thresholds.max_insights);

    info!(
        entities = batch.len(),
        generated,
        returned = insights.len(),
        "Insights generated"
    );
    insights
}

/// Stable sort: actionable first, then confidence descending.
pub fn sort_insights(insights: &mut [Insight]) {
    insights.sort_by(|a, b| {
        b.actionable
            .cmp(&a.actionable)
            .then_with(|| b.confidence.cmp(&a.confidence))
    });
}

/// Rule engine bound to one set of thresholds.
#[derive(Debug, Clone, Default)]
pub struct InsightEngine {
    thresholds: InsightThresholds,
}

impl InsightEngine {
    pub fn new(thresholds: InsightThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &InsightThresholds {
        &self.thresholds
    }

    /// Generate insights using batch statistics only.
    pub fn generate(&self, batch: &EntityBatch) -> Vec<Insight> {
        generate(batch, &DerivedStats::from_batch(batch), &self.thresholds)
    }

    /// Generate insights with caller-supplied derived statistics.
    pub fn generate_with(&self, batch: &EntityBatch, stats: &DerivedStats) -> Vec<Insight> {
        generate(batch, stats, &self.thresholds)
    }
}

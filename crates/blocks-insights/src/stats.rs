//! Batch-level statistics consumed by trend rules.

use blocks_metrics::{EntityBatch, MetricKey};
use blocks_ranking::PercentileTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Summary of one metric column, over present values only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Count and mean of strictly positive values (P/E style metrics).
    pub positive_count: usize,
    pub positive_mean: Option<f64>,
}

/// Per-metric summaries for a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    pub entity_count: usize,
    pub metrics: BTreeMap<MetricKey, MetricSummary>,
}

impl BatchStats {
    /// Summarise every metric that has at least one present value.
    pub fn from_batch(batch: &EntityBatch) -> Self {
        let mut metrics = BTreeMap::new();
        for key in MetricKey::ALL {
            let values: Vec<f64> = batch.iter().filter_map(|r| r.value(key)).collect();
            if values.is_empty() {
                continue;
            }
            let count = values.len();
            let mean = values.iter().sum::<f64>() / count as f64;
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

            let positives: Vec<f64> = values.iter().copied().filter(|v| *v > 0.0).collect();
            let positive_mean = (!positives.is_empty())
                .then(|| positives.iter().sum::<f64>() / positives.len() as f64);

            metrics.insert(
                key,
                MetricSummary {
                    count,
                    mean,
                    min,
                    max,
                    positive_count: positives.len(),
                    positive_mean,
                },
            );
        }
        Self {
            entity_count: batch.len(),
            metrics,
        }
    }

    pub fn get(&self, key: MetricKey) -> Option<&MetricSummary> {
        self.metrics.get(&key)
    }

    pub fn mean(&self, key: MetricKey) -> Option<f64> {
        self.get(key).map(|s| s.mean)
    }
}

/// Everything rules may read besides the raw rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedStats {
    pub batch: BatchStats,
    pub percentiles: Option<PercentileTable>,
}

impl DerivedStats {
    pub fn from_batch(batch: &EntityBatch) -> Self {
        Self {
            batch: BatchStats::from_batch(batch),
            percentiles: None,
        }
    }

    pub fn with_percentiles(mut self, table: PercentileTable) -> Self {
        self.percentiles = Some(table);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blocks_metrics::EntityRow;

    #[test]
    fn test_stats_ignore_missing_values() {
        let batch = EntityBatch::new(vec![
            EntityRow::new("A").with(MetricKey::PeRatio, 10.0),
            EntityRow::new("B").with(MetricKey::PeRatio, None),
            EntityRow::new("C").with(MetricKey::PeRatio, -30.0),
            EntityRow::new("D").with(MetricKey::PeRatio, 20.0),
        ])
        .unwrap();

        let stats = BatchStats::from_batch(&batch);
        let pe = stats.get(MetricKey::PeRatio).unwrap();
        assert_eq!(stats.entity_count, 4);
        assert_eq!(pe.count, 3);
        assert_eq!(pe.mean, 0.0);
        assert_eq!(pe.min, -30.0);
        assert_eq!(pe.max, 20.0);
        assert_eq!(pe.positive_count, 2);
        assert_eq!(pe.positive_mean, Some(15.0));
        assert!(stats.get(MetricKey::GrossMargin).is_none());
    }
}

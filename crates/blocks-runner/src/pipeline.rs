//! Pipeline driver: batch → percentiles → leaderboard → insights.
//!
//! ```text
//! EntityBatch ─(derive)─▶ EntityBatch ─rank_batch─▶ PercentileTable ─score─▶ Leaderboard
//!                              │                          │
//!                              └──────────── generate ◀───┘──▶ Vec<Insight>
//! ```
//!
//! The pipeline holds a validated configuration. Each run is independent
//! and deterministic apart from the report timestamp.

use crate::config::{ConfigError, EngineConfig};
use blocks_insights::{DerivedStats, Insight, generate};
use blocks_metrics::{BatchError, CatalogError, EntityBatch, MetricCatalog};
use blocks_ranking::{
    Leaderboard, PercentileTable, ScoringError, rank_batch, score, with_derived_metrics,
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Everything the dashboard panels consume for one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub generated_at_utc: String,
    pub entity_count: usize,
    pub percentiles: PercentileTable,
    pub leaderboard: Leaderboard,
    pub insights: Vec<Insight>,
}

/// Validated engine ready to run batches.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: EngineConfig,
    catalog: MetricCatalog,
}

impl Pipeline {
    /// Validate `config` against `catalog` and build the pipeline.
    pub fn new(config: EngineConfig, catalog: MetricCatalog) -> Result<Self, PipelineError> {
        config.validate(&catalog)?;
        Ok(Self { config, catalog })
    }

    /// Pipeline over the built-in catalog.
    pub fn with_builtin_catalog(config: EngineConfig) -> Result<Self, PipelineError> {
        Self::new(config, MetricCatalog::builtin())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Apply configured derivations; the input batch is left untouched.
    pub fn prepare(&self, batch: &EntityBatch) -> Result<EntityBatch, PipelineError> {
        if self.config.ranking.derive_magic_formula {
            Ok(with_derived_metrics(batch)?)
        } else {
            Ok(batch.clone())
        }
    }

    /// Percentile table and leaderboard for a prepared batch.
    pub fn rank(
        &self,
        batch: &EntityBatch,
    ) -> Result<(PercentileTable, Leaderboard), PipelineError> {
        let table = rank_batch(
            batch,
            &self.config.ranking.metrics,
            &self.catalog,
            self.config.ranking.null_policy,
        )?;
        let leaderboard = score(batch, &table, &self.config.weighting)?;
        Ok((table, leaderboard))
    }

    /// Insights for a prepared batch, optionally with its percentile table.
    pub fn insights(&self, batch: &EntityBatch, table: Option<PercentileTable>) -> Vec<Insight> {
        let mut stats = DerivedStats::from_batch(batch);
        if let Some(table) = table {
            stats = stats.with_percentiles(table);
        }
        generate(batch, &stats, &self.config.insights)
    }

    /// Full run over a raw batch.
    pub fn run(&self, batch: &EntityBatch) -> Result<AnalysisReport, PipelineError> {
        let prepared = self.prepare(batch)?;
        let (table, leaderboard) = self.rank(&prepared)?;
        let insights = self.insights(&prepared, Some(table.clone()));

        info!(
            entities = prepared.len(),
            leaderboard = leaderboard.len(),
            insights = insights.len(),
            "Pipeline run complete"
        );

        Ok(AnalysisReport {
            generated_at_utc: chrono::Utc::now().to_rfc3339(),
            entity_count: prepared.len(),
            percentiles: table,
            leaderboard,
            insights,
        })
    }
}

/// Pipeline errors, one variant per stage.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid batch: {0}")]
    Batch(#[from] BatchError),

    #[error("Ranking failed: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Scoring failed: {0}")]
    Scoring(#[from] ScoringError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use blocks_metrics::{EntityRow, MetricKey};

    fn batch() -> EntityBatch {
        EntityBatch::new(vec![
            EntityRow::new("AAA")
                .with(MetricKey::Ebit, 120.0)
                .with(MetricKey::EnterpriseValue, 1000.0)
                .with(MetricKey::NetWorkingCapital, 400.0),
            EntityRow::new("BBB")
                .with(MetricKey::Ebit, 50.0)
                .with(MetricKey::EnterpriseValue, 1000.0)
                .with(MetricKey::NetWorkingCapital, 500.0),
            EntityRow::new("CCC")
                .with(MetricKey::Ebit, 300.0)
                .with(MetricKey::EnterpriseValue, 1000.0)
                .with(MetricKey::NetWorkingCapital, 600.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_run_derives_and_ranks() {
        let pipeline = Pipeline::with_builtin_catalog(EngineConfig::default()).unwrap();
        let report = pipeline.run(&batch()).unwrap();

        // CCC: EY 0.30, ROC 0.50 → top on both.
        assert_eq!(report.entity_count, 3);
        assert_eq!(report.leaderboard.rows()[0].id, "CCC");
        assert_eq!(report.leaderboard.rows()[0].score, 100);
        assert_eq!(report.percentiles.get("BBB", MetricKey::EarningsYield), Some(0));
        assert!(!report.insights.is_empty());
    }

    #[test]
    fn test_run_without_derivation_scores_zero() {
        let mut config = EngineConfig::default();
        config.ranking.derive_magic_formula = false;
        let pipeline = Pipeline::with_builtin_catalog(config).unwrap();
        let report = pipeline.run(&batch()).unwrap();

        // Nothing to rank: every value is null-as-zero, so ties keep batch order.
        let ids: Vec<_> = report.leaderboard.rows().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["AAA", "BBB", "CCC"]);
        assert!(report.leaderboard.rows().iter().all(|r| r.score == 0));
    }

    #[test]
    fn test_empty_batch_runs() {
        let pipeline = Pipeline::with_builtin_catalog(EngineConfig::default()).unwrap();
        let report = pipeline.run(&EntityBatch::empty()).unwrap();
        assert!(report.leaderboard.is_empty());
        assert_eq!(report.insights.len(), 1);
        assert_eq!(report.insights[0].title, "No data available");
    }

    #[test]
    fn test_invalid_config_rejected_up_front() {
        let mut config = EngineConfig::default();
        config.ranking.metrics = vec![MetricKey::ReturnOnCapital];
        assert!(matches!(
            Pipeline::with_builtin_catalog(config),
            Err(PipelineError::Config(ConfigError::UnrankedWeight { .. }))
        ));
    }

    #[test]
    fn test_catalog_missing_rule_metric_rejected() {
        let catalog = MetricCatalog::builtin()
            .with_only(&[MetricKey::ReturnOnCapital, MetricKey::EarningsYield]);
        assert!(matches!(
            Pipeline::new(EngineConfig::default(), catalog),
            Err(PipelineError::Config(ConfigError::Catalog(_)))
        ));
    }
}

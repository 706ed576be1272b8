//! Engine configuration loaded from TOML.
//!
//! ## Format
//! ```toml
//! [ranking]
//! metrics = ["return_on_capital", "earnings_yield", "gross_margin"]
//! null_policy = "zero"          # or "floor"
//! derive_magic_formula = true
//!
//! [[weighting]]
//! metric = "return_on_capital"
//! weight = 0.5
//!
//! [[weighting]]
//! metric = "earnings_yield"
//! weight = 0.5
//!
//! [insights]
//! max_insights = 10
//! risk_max_debt_to_equity = 2.5
//!
//! [registry]
//! min_trust = "commons"
//! ```
//!
//! Every section is optional. Omitted sections take the built-in defaults
//! (magic-formula ranking and weighting, default insight thresholds, no
//! trust filtering).

use blocks_insights::{InsightRule, InsightThresholds, ThresholdError};
use blocks_metrics::{CatalogError, MetricCatalog, MetricKey};
use blocks_ranking::{CompositeWeighting, NullPolicy};
use blocks_recipes::TrustTier;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Ranking section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Metrics ranked into the percentile table, in column order.
    pub metrics: Vec<MetricKey>,
    pub null_policy: NullPolicy,
    /// Fill earnings yield / return on capital from EBIT, EV and NWC when absent.
    pub derive_magic_formula: bool,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            metrics: vec![MetricKey::ReturnOnCapital, MetricKey::EarningsYield],
            null_policy: NullPolicy::Zero,
            derive_magic_formula: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub min_trust: TrustTier,
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub ranking: RankingConfig,
    pub weighting: CompositeWeighting,
    pub insights: InsightThresholds,
    pub registry: RegistryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ranking: RankingConfig::default(),
            weighting: CompositeWeighting::magic_formula(),
            insights: InsightThresholds::default(),
            registry: RegistryConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file. Does not validate against a catalog.
    pub fn from_toml(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_toml_str(&content, path)
    }

    pub fn from_toml_str(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Check the configuration against a metric catalog.
    ///
    /// Checks:
    /// 1. every ranked, weighted and rule-read metric has a spec
    /// 2. the weighting is non-empty
    /// 3. every weighted metric is ranked
    /// 4. insight thresholds are internally consistent
    pub fn validate(&self, catalog: &MetricCatalog) -> Result<(), ConfigError> {
        catalog.require_all(&self.ranking.metrics)?;
        catalog.require_all(&self.weighting.metrics())?;
        for rule in InsightRule::ALL {
            catalog.require_all(rule.metric_keys())?;
        }

        if self.weighting.is_empty() {
            return Err(ConfigError::EmptyWeighting);
        }
        for metric in self.weighting.metrics() {
            if !self.ranking.metrics.contains(&metric) {
                return Err(ConfigError::UnrankedWeight { metric });
            }
        }

        self.insights.validate()?;
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error loading config from {path}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Parse error in config {path}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Weighted metric '{metric}' is not listed in ranking.metrics")]
    UnrankedWeight { metric: MetricKey },

    #[error("Weighting is empty")]
    EmptyWeighting,

    #[error("Invalid insight thresholds: {0}")]
    Thresholds(#[from] ThresholdError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> PathBuf {
        PathBuf::from("engine.toml")
    }

    #[test]
    fn test_default_config_valid() {
        let config = EngineConfig::default();
        assert!(config.validate(&MetricCatalog::builtin()).is_ok());
        assert_eq!(config.registry.min_trust, TrustTier::ThirdParty);
    }

    #[test]
    fn test_empty_file_is_default() {
        let config = EngineConfig::from_toml_str("", &path()).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [ranking]
            metrics = ["gross_margin", "pe_ratio"]
            null_policy = "floor"

            [[weighting]]
            metric = "gross_margin"
            weight = 0.7

            [[weighting]]
            metric = "pe_ratio"
            weight = 0.3

            [insights]
            max_insights = 4
            risk_max_debt_to_equity = 2.5

            [registry]
            min_trust = "commons"
        "#;
        let config = EngineConfig::from_toml_str(toml, &path()).unwrap();
        assert_eq!(config.ranking.metrics, vec![MetricKey::GrossMargin, MetricKey::PeRatio]);
        assert_eq!(config.ranking.null_policy, NullPolicy::Floor);
        assert!(config.ranking.derive_magic_formula);
        assert_eq!(config.weighting.weights().len(), 2);
        assert_eq!(config.insights.max_insights, 4);
        assert_eq!(config.insights.risk_max_debt_to_equity, 2.5);
        assert_eq!(config.insights.quality_max_debt_to_equity, 1.0);
        assert_eq!(config.registry.min_trust, TrustTier::Commons);
        assert!(config.validate(&MetricCatalog::builtin()).is_ok());
    }

    #[test]
    fn test_unranked_weight_rejected() {
        let toml = r#"
            [ranking]
            metrics = ["return_on_capital"]

            [[weighting]]
            metric = "earnings_yield"
            weight = 1.0
        "#;
        let config = EngineConfig::from_toml_str(toml, &path()).unwrap();
        assert!(matches!(
            config.validate(&MetricCatalog::builtin()),
            Err(ConfigError::UnrankedWeight {
                metric: MetricKey::EarningsYield
            })
        ));
    }

    #[test]
    fn test_metric_without_spec_rejected() {
        let config = EngineConfig::default();
        let catalog = MetricCatalog::builtin().with_only(&[MetricKey::EarningsYield]);
        assert!(matches!(config.validate(&catalog), Err(ConfigError::Catalog(_))));
    }

    #[test]
    fn test_rule_metric_without_spec_rejected() {
        let config = EngineConfig::default();
        let catalog = MetricCatalog::builtin()
            .with_only(&[MetricKey::ReturnOnCapital, MetricKey::EarningsYield]);
        assert!(matches!(
            config.validate(&catalog),
            Err(ConfigError::Catalog(CatalogError::UnknownMetric(MetricKey::DebtToEquity)))
        ));
    }

    #[test]
    fn test_zero_max_insights_rejected() {
        let toml = "[insights]\nmax_insights = 0\n";
        let config = EngineConfig::from_toml_str(toml, &path()).unwrap();
        assert!(matches!(
            config.validate(&MetricCatalog::builtin()),
            Err(ConfigError::Thresholds(ThresholdError::MaxInsightsOutOfRange(0)))
        ));
    }

    #[test]
    fn test_unknown_metric_name_is_parse_error() {
        let toml = r#"
            [ranking]
            metrics = ["vibes"]
        "#;
        assert!(matches!(
            EngineConfig::from_toml_str(toml, &path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}

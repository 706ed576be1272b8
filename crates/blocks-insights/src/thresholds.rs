//! Insight rule thresholds.
//!
//! Every rule constant lives here so a deployment can tune the battery from
//! one TOML table. Missing keys fall back to `Default`.
//!
//! Units follow the metric catalog: margins, growth and FCF yield are
//! percentages; earnings yield and return on capital are fractions.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Output cap after sorting.
pub const DEFAULT_MAX_INSIGHTS: usize = 10;

/// Ticker sample bounds for summaries.
pub const MIN_SAMPLE_SIZE: usize = 3;
pub const MAX_SAMPLE_SIZE: usize = 5;

/// Tunable constants for the insight battery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightThresholds {
    // === Opportunity ===
    pub quality_min_return_on_capital: f64,
    pub quality_min_earnings_yield: f64,
    pub quality_max_debt_to_equity: f64,
    pub cash_min_fcf_yield: f64,
    pub cash_min_operating_margin: f64,
    pub leader_min_percentile: u8,

    // === Risk ===
    pub risk_max_debt_to_equity: f64,
    pub risk_min_interest_coverage: f64,

    // === Trend ===
    pub valuation_attractive_pe: f64,
    pub valuation_fair_pe: f64,
    pub growth_expanding_pct: f64,

    // === Outlier (stricter than the opportunity thresholds) ===
    pub outlier_min_return_on_capital: f64,
    pub outlier_min_earnings_yield: f64,

    // === Correlation ===
    pub discount_min_gross_margin: f64,
    pub discount_max_pe: f64,
    pub garp_min_revenue_growth: f64,
    pub garp_max_ev_to_ebitda: f64,

    // === Output ===
    pub max_insights: usize,
    pub sample_size: usize,
}

impl Default for InsightThresholds {
    fn default() -> Self {
        Self {
            quality_min_return_on_capital: 0.25,
            quality_min_earnings_yield: 0.08,
            quality_max_debt_to_equity: 1.0,
            cash_min_fcf_yield: 6.0,
            cash_min_operating_margin: 15.0,
            leader_min_percentile: 90,

            risk_max_debt_to_equity: 2.0,
            risk_min_interest_coverage: 1.5,

            valuation_attractive_pe: 15.0,
            valuation_fair_pe: 25.0,
            growth_expanding_pct: 10.0,

            outlier_min_return_on_capital: 1.0,
            outlier_min_earnings_yield: 0.20,

            discount_min_gross_margin: 40.0,
            discount_max_pe: 15.0,
            garp_min_revenue_growth: 15.0,
            garp_max_ev_to_ebitda: 12.0,

            max_insights: DEFAULT_MAX_INSIGHTS,
            sample_size: MAX_SAMPLE_SIZE,
        }
    }
}

impl InsightThresholds {
    /// Load from a TOML file.
    pub fn from_toml(path: &Path) -> Result<Self, ThresholdError> {
        let content = std::fs::read_to_string(path).map_err(|e| ThresholdError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        let thresholds: Self = toml::from_str(&content).map_err(|e| ThresholdError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        thresholds.validate()?;
        Ok(thresholds)
    }

    /// Sample size clamped to the supported range.
    pub fn effective_sample_size(&self) -> usize {
        self.sample_size.clamp(MIN_SAMPLE_SIZE, MAX_SAMPLE_SIZE)
    }

    /// Check relationships between thresholds.
    ///
    /// - outlier thresholds strictly exceed the matching opportunity thresholds
    /// - attractive P/E < fair P/E
    /// - leader percentile <= 100
    /// - 1 <= max_insights <= `DEFAULT_MAX_INSIGHTS`
    pub fn validate(&self) -> Result<(), ThresholdError> {
        if self.outlier_min_return_on_capital <= self.quality_min_return_on_capital {
            return Err(ThresholdError::OutlierNotStricter {
                field: "outlier_min_return_on_capital".to_string(),
                outlier: self.outlier_min_return_on_capital,
                opportunity: self.quality_min_return_on_capital,
            });
        }
        if self.outlier_min_earnings_yield <= self.quality_min_earnings_yield {
            return Err(ThresholdError::OutlierNotStricter {
                field: "outlier_min_earnings_yield".to_string(),
                outlier: self.outlier_min_earnings_yield,
                opportunity: self.quality_min_earnings_yield,
            });
        }
        if self.valuation_attractive_pe >= self.valuation_fair_pe {
            return Err(ThresholdError::InvalidBuckets {
                lower: self.valuation_attractive_pe,
                upper: self.valuation_fair_pe,
            });
        }
        if self.leader_min_percentile > 100 {
            return Err(ThresholdError::PercentileOutOfRange(self.leader_min_percentile));
        }
        if !(1..=DEFAULT_MAX_INSIGHTS).contains(&self.max_insights) {
            return Err(ThresholdError::MaxInsightsOutOfRange(self.max_insights));
        }
        Ok(())
    }
}

/// Threshold loading and validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ThresholdError {
    #[error("IO error loading thresholds from {path}: {error}")]
    Io {
        path: std::path::PathBuf,
        error: String,
    },

    #[error("Parse error in thresholds {path}: {error}")]
    Parse {
        path: std::path::PathBuf,
        error: String,
    },

    #[error("{field} ({outlier}) must be stricter than the opportunity threshold ({opportunity})")]
    OutlierNotStricter {
        field: String,
        outlier: f64,
        opportunity: f64,
    },

    #[error("Valuation buckets out of order: attractive {lower} must be below fair {upper}")]
    InvalidBuckets { lower: f64, upper: f64 },

    #[error("Leader percentile {0} exceeds 100")]
    PercentileOutOfRange(u8),

    #[error("max_insights {0} must be between 1 and {max}", max = DEFAULT_MAX_INSIGHTS)]
    MaxInsightsOutOfRange(usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_validate() {
        assert!(InsightThresholds::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "risk_max_debt_to_equity = 3.0\nmax_insights = 4").unwrap();

        let t = InsightThresholds::from_toml(file.path()).unwrap();
        assert_eq!(t.risk_max_debt_to_equity, 3.0);
        assert_eq!(t.max_insights, 4);
        assert_eq!(t.quality_min_return_on_capital, 0.25);
    }

    #[test]
    fn test_outlier_must_be_stricter() {
        let t = InsightThresholds {
            outlier_min_return_on_capital: 0.2,
            ..Default::default()
        };
        assert!(matches!(
            t.validate(),
            Err(ThresholdError::OutlierNotStricter { .. })
        ));
    }

    #[test]
    fn test_max_insights_bounds() {
        for max_insights in [0, DEFAULT_MAX_INSIGHTS + 1] {
            let t = InsightThresholds {
                max_insights,
                ..Default::default()
            };
            assert_eq!(
                t.validate(),
                Err(ThresholdError::MaxInsightsOutOfRange(max_insights))
            );
        }
        let t = InsightThresholds {
            max_insights: 1,
            ..Default::default()
        };
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_sample_size_clamped() {
        let t = InsightThresholds {
            sample_size: 50,
            ..Default::default()
        };
        assert_eq!(t.effective_sample_size(), MAX_SAMPLE_SIZE);
        let t = InsightThresholds {
            sample_size: 1,
            ..Default::default()
        };
        assert_eq!(t.effective_sample_size(), MIN_SAMPLE_SIZE);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = InsightThresholds::from_toml(Path::new("/nonexistent/thresholds.toml"))
            .unwrap_err();
        assert!(matches!(err, ThresholdError::Io { .. }));
    }
}

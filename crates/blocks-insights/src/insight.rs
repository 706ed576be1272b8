//! Insight records.

use blocks_metrics::MetricKey;
use serde::{Deserialize, Serialize};

/// Insight family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightCategory {
    Opportunity,
    Risk,
    Trend,
    Outlier,
    Correlation,
}

impl InsightCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            InsightCategory::Opportunity => "opportunity",
            InsightCategory::Risk => "risk",
            InsightCategory::Trend => "trend",
            InsightCategory::Outlier => "outlier",
            InsightCategory::Correlation => "correlation",
        }
    }

    /// Icon name rendered on the insight card.
    pub fn icon(self) -> &'static str {
        match self {
            InsightCategory::Opportunity => "target",
            InsightCategory::Risk => "alert-triangle",
            InsightCategory::Trend => "trending-up",
            InsightCategory::Outlier => "zap",
            InsightCategory::Correlation => "link",
        }
    }
}

impl std::fmt::Display for InsightCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One generated observation about the batch.
///
/// Never mutated after creation; the engine only reorders and truncates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    /// Stable identifier of the rule that produced this insight
    pub rule_id: String,
    pub category: InsightCategory,
    pub title: String,
    pub summary: String,
    pub detail: String,
    /// Ticker sample in batch order
    pub tickers: Vec<String>,
    pub metric_keys: Vec<MetricKey>,
    /// Rule-intrinsic reliability, 0..=100
    pub confidence: u8,
    pub actionable: bool,
}

impl Insight {
    pub fn icon(&self) -> &'static str {
        self.category.icon()
    }
}

//! # Blocks Insights
//!
//! Rule-based natural-language insights over a fundamentals batch.
//!
//! ## Modules
//! - `thresholds`: every tunable rule constant (TOML-loadable)
//! - `stats`: batch means and optional percentile table handed to rules
//! - `rules`: the fixed rule battery
//! - `engine`: evaluation, ordering and truncation
//!
//! ## Usage
//! ```ignore
//! use blocks_insights::{DerivedStats, InsightThresholds, generate};
//!
//! let stats = DerivedStats::from_batch(&batch).with_percentiles(table);
//! let insights = generate(&batch, &stats, &InsightThresholds::default());
//! ```

pub mod engine;
pub mod insight;
pub mod rules;
pub mod stats;
pub mod thresholds;

pub use engine::{InsightEngine, generate, sort_insights};
pub use insight::{Insight, InsightCategory};
pub use rules::{InsightRule, NO_DATA_RULE_ID, no_data_insight};
pub use stats::{BatchStats, DerivedStats, MetricSummary};
pub use thresholds::{DEFAULT_MAX_INSIGHTS, InsightThresholds, ThresholdError};

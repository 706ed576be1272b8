//! # Blocks Ranking
//!
//! Cross-sectional ranking for a batch of entities.
//!
//! ## Pipeline
//! ```text
//! EntityBatch ──rank_batch──▶ PercentileTable ──score──▶ Leaderboard
//! ```
//!
//! ## Modules
//! - `percentile`: first-occurrence percentile ranks, null policy
//! - `composite`: weighted composite score, stable leaderboard ranks
//! - `magic_formula`: earnings yield / return on capital derivation and ranking
//! - `screen`: filter + rank-by screens over a batch
//!
//! ## Usage
//! ```ignore
//! use blocks_ranking::{CompositeWeighting, NullPolicy, rank_batch, score};
//!
//! let weighting = CompositeWeighting::magic_formula();
//! let table = rank_batch(&batch, &weighting.metrics(), &catalog, NullPolicy::Zero)?;
//! let board = score(&batch, &table, &weighting)?;
//! ```

pub mod composite;
pub mod magic_formula;
pub mod percentile;
pub mod screen;

pub use composite::{
    CompositeWeighting, Leaderboard, LeaderboardRow, MetricWeight, ScoringError, score,
};
pub use magic_formula::{
    MagicFormulaRow, earnings_yield, rank_magic_formula, return_on_capital, with_derived_metrics,
};
pub use percentile::{NullPolicy, PercentileTable, rank, rank_batch, rank_with_policy};
pub use screen::{
    DEFAULT_SCREEN_LIMIT, FilterOp, FilterValue, RankOrder, ScreenDefinition, ScreenError,
    ScreenFilter, run_screen,
};

//! Magic-formula (Greenblatt) derivation and ranking.
//!
//! ## Definitions
//! - `earnings_yield    = ebit / enterprise_value`    (only when EV > 0)
//! - `return_on_capital = ebit / net_working_capital` (only when NWC != 0)
//!
//! ## Ranking
//! Valid rows (EBIT present, EV > 0, NWC != 0) come first, ordered by
//! earnings yield descending. Rows that cannot be scored follow in batch
//! order. Ranks are 1..N by position.

use blocks_metrics::{BatchError, EntityBatch, EntityRow, MetricKey};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Derived magic-formula metrics for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MagicFormulaRow {
    pub ticker: String,
    pub earnings_yield: Option<f64>,
    pub return_on_capital: Option<f64>,
    pub rank: usize,
}

/// `ebit / enterprise_value`, or `None` when EV is not positive.
pub fn earnings_yield(row: &EntityRow) -> Option<f64> {
    let ebit = row.value(MetricKey::Ebit)?;
    let ev = row.value(MetricKey::EnterpriseValue)?;
    (ev > 0.0).then(|| ebit / ev)
}

/// `ebit / net_working_capital`, or `None` when NWC is zero.
pub fn return_on_capital(row: &EntityRow) -> Option<f64> {
    let ebit = row.value(MetricKey::Ebit)?;
    let nwc = row.value(MetricKey::NetWorkingCapital)?;
    (nwc != 0.0).then(|| ebit / nwc)
}

fn is_scoreable(row: &EntityRow) -> bool {
    row.value(MetricKey::Ebit).is_some()
        && row.value(MetricKey::EnterpriseValue).is_some_and(|ev| ev > 0.0)
        && row.value(MetricKey::NetWorkingCapital).is_some_and(|nwc| nwc != 0.0)
}

/// Rank a batch by the magic formula.
pub fn rank_magic_formula(batch: &EntityBatch) -> Vec<MagicFormulaRow> {
    let mut scored: Vec<(bool, MagicFormulaRow)> = batch
        .iter()
        .map(|row| {
            (
                is_scoreable(row),
                MagicFormulaRow {
                    ticker: row.id.clone(),
                    earnings_yield: earnings_yield(row),
                    return_on_capital: return_on_capital(row),
                    rank: 0,
                },
            )
        })
        .collect();

    scored.sort_by(|(a_valid, a), (b_valid, b)| match (a_valid, b_valid) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => Ordering::Equal,
        (true, true) => {
            let ay = a.earnings_yield.unwrap_or(-1.0);
            let by = b.earnings_yield.unwrap_or(-1.0);
            by.total_cmp(&ay)
        }
    });

    scored
        .into_iter()
        .enumerate()
        .map(|(i, (_, mut row))| {
            row.rank = i + 1;
            row
        })
        .collect()
}

/// Copy of `batch` with earnings yield and return on capital filled in.
///
/// Values already present in a row are kept.
pub fn with_derived_metrics(batch: &EntityBatch) -> Result<EntityBatch, BatchError> {
    let rows = batch
        .iter()
        .map(|row| {
            let mut out = row.clone();
            if out.value(MetricKey::EarningsYield).is_none() {
                out.metrics.insert(MetricKey::EarningsYield, earnings_yield(row));
            }
            if out.value(MetricKey::ReturnOnCapital).is_none() {
                out.metrics
                    .insert(MetricKey::ReturnOnCapital, return_on_capital(row));
            }
            out
        })
        .collect();
    EntityBatch::new(rows)
}

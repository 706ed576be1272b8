//! Screens: declarative filters plus a single rank-by column.
//!
//! Filters are combined with AND. Comparisons against a missing value are
//! false (SQL NULL semantics); only `is_null` matches a missing value.
//! Sorting by `rank_by` is stable and always puts missing values last.

use blocks_metrics::{EntityBatch, EntityRow, MetricKey};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

pub const DEFAULT_SCREEN_LIMIT: usize = 20;

fn default_limit() -> usize {
    DEFAULT_SCREEN_LIMIT
}

/// Filter comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "between")]
    Between,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not_in")]
    NotIn,
    #[serde(rename = "is_null")]
    IsNull,
    #[serde(rename = "is_not_null")]
    IsNotNull,
}

/// Filter operand: a scalar, or a list for `between` / `in` / `not_in`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Scalar(f64),
    List(Vec<f64>),
}

/// One filter clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenFilter {
    pub field: MetricKey,
    pub op: FilterOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<FilterValue>,
}

impl ScreenFilter {
    pub fn new(field: MetricKey, op: FilterOp, value: impl Into<Option<FilterValue>>) -> Self {
        Self {
            field,
            op,
            value: value.into(),
        }
    }

    /// Check that the operand shape fits the operator.
    pub fn validate(&self) -> Result<(), ScreenError> {
        let ok = match (self.op, &self.value) {
            (FilterOp::IsNull | FilterOp::IsNotNull, _) => true,
            (FilterOp::Between, Some(FilterValue::List(bounds))) => bounds.len() == 2,
            (FilterOp::In | FilterOp::NotIn, Some(FilterValue::List(_))) => true,
            (
                FilterOp::Gt | FilterOp::Lt | FilterOp::Gte | FilterOp::Lte | FilterOp::Eq | FilterOp::Ne,
                Some(FilterValue::Scalar(_)),
            ) => true,
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(ScreenError::InvalidFilterValue {
                field: self.field,
                op: self.op,
            })
        }
    }

    /// Evaluate against a row. Assumes `validate` passed.
    pub fn matches(&self, row: &EntityRow) -> bool {
        let actual = row.value(self.field);
        match self.op {
            FilterOp::IsNull => return actual.is_none(),
            FilterOp::IsNotNull => return actual.is_some(),
            _ => {}
        }
        let Some(v) = actual else {
            return false;
        };

        match (&self.value, self.op) {
            (Some(FilterValue::Scalar(x)), FilterOp::Gt) => v > *x,
            (Some(FilterValue::Scalar(x)), FilterOp::Lt) => v < *x,
            (Some(FilterValue::Scalar(x)), FilterOp::Gte) => v >= *x,
            (Some(FilterValue::Scalar(x)), FilterOp::Lte) => v <= *x,
            (Some(FilterValue::Scalar(x)), FilterOp::Eq) => v == *x,
            (Some(FilterValue::Scalar(x)), FilterOp::Ne) => v != *x,
            (Some(FilterValue::List(b)), FilterOp::Between) if b.len() == 2 => {
                v >= b[0] && v <= b[1]
            }
            (Some(FilterValue::List(list)), FilterOp::In) => list.contains(&v),
            (Some(FilterValue::List(list)), FilterOp::NotIn) => !list.contains(&v),
            _ => false,
        }
    }
}

/// Sort direction for `rank_by`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RankOrder {
    Asc,
    #[default]
    Desc,
}

/// Saved screen definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub filters: Vec<ScreenFilter>,
    #[serde(default)]
    pub rank_by: Option<MetricKey>,
    #[serde(default)]
    pub rank_order: RankOrder,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl ScreenDefinition {
    /// New screen; id derived from the name as `screen:<snake_name>`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: format!("screen:{}", name.to_lowercase().replace(' ', "_")),
            name,
            description: String::new(),
            filters: Vec::new(),
            rank_by: None,
            rank_order: RankOrder::Desc,
            limit: DEFAULT_SCREEN_LIMIT,
        }
    }

    pub fn filter(mut self, filter: ScreenFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn rank_by(mut self, key: MetricKey, order: RankOrder) -> Self {
        self.rank_by = Some(key);
        self.rank_order = order;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// Apply a screen to a batch.
pub fn run_screen<'a>(
    batch: &'a EntityBatch,
    screen: &ScreenDefinition,
) -> Result<Vec<&'a EntityRow>, ScreenError> {
    for filter in &screen.filters {
        filter.validate()?;
    }

    let mut hits: Vec<&EntityRow> = batch
        .iter()
        .filter(|row| screen.filters.iter().all(|f| f.matches(row)))
        .collect();

    if let Some(key) = screen.rank_by {
        hits.sort_by(|a, b| match (a.value(key), b.value(key)) {
            (Some(x), Some(y)) => match screen.rank_order {
                RankOrder::Asc => x.total_cmp(&y),
                RankOrder::Desc => y.total_cmp(&x),
            },
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
    }

    hits.truncate(screen.limit);
    debug!(screen = %screen.id, matched = hits.len(), "Screen evaluated");
    Ok(hits)
}

/// Screen definition errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScreenError {
    #[error("Filter on '{field}' has an operand that does not fit operator {op:?}")]
    InvalidFilterValue { field: MetricKey, op: FilterOp },
}

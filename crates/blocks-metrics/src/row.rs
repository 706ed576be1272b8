//! Entity rows and batches.
//!
//! An `EntityBatch` is the unit every computation consumes: one row per
//! ticker, in the order the data service returned them. Rows are immutable
//! once the batch is built.
//!
//! ## Fetch Boundary
//! `EntityBatch::from_fetch_json` validates the loosely-typed
//! `{ "rows": [ { "ticker": ..., <metric>: ... } ] }` payload:
//! - `ticker` is required and must be a non-empty string
//! - keys that are not metric names are ignored
//! - null, non-numeric and non-finite metric values become `None`

use crate::catalog::MetricKey;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

// =============================================================================
// Entity Row
// =============================================================================

/// One entity (ticker) with its metric values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRow {
    pub id: String,
    pub metrics: BTreeMap<MetricKey, Option<f64>>,
}

impl EntityRow {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            metrics: BTreeMap::new(),
        }
    }

    /// Builder-style setter.
    pub fn with(mut self, key: MetricKey, value: impl Into<Option<f64>>) -> Self {
        self.metrics.insert(key, value.into());
        self
    }

    /// Value for a metric; absent and null both read as `None`.
    pub fn value(&self, key: MetricKey) -> Option<f64> {
        self.metrics.get(&key).copied().flatten()
    }
}

// =============================================================================
// Entity Batch
// =============================================================================

/// Ordered batch of entity rows with unique ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityBatch {
    rows: Vec<EntityRow>,
}

impl EntityBatch {
    /// Build a batch, rejecting duplicate tickers.
    pub fn new(rows: Vec<EntityRow>) -> Result<Self, BatchError> {
        let mut seen = HashSet::with_capacity(rows.len());
        for row in &rows {
            if row.id.trim().is_empty() {
                return Err(BatchError::MissingTicker { index: seen.len() });
            }
            if !seen.insert(row.id.as_str()) {
                return Err(BatchError::DuplicateEntity {
                    id: row.id.clone(),
                });
            }
        }
        Ok(Self { rows })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[EntityRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityRow> {
        self.rows.iter()
    }

    pub fn get(&self, id: &str) -> Option<&EntityRow> {
        self.rows.iter().find(|r| r.id == id)
    }

    /// One metric column in batch order.
    pub fn column(&self, key: MetricKey) -> Vec<Option<f64>> {
        self.rows.iter().map(|r| r.value(key)).collect()
    }

    /// Parse the data-fetch payload (`{"rows": [...]}`).
    pub fn from_fetch_json(json: &str) -> Result<Self, BatchError> {
        let payload: FetchPayload =
            serde_json::from_str(json).map_err(|e| BatchError::Parse(e.to_string()))?;
        Self::from_fetch_rows(payload.rows)
    }

    /// Validate already-decoded fetch rows.
    pub fn from_fetch_rows(
        raw_rows: Vec<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<Self, BatchError> {
        let mut rows = Vec::with_capacity(raw_rows.len());
        for (index, raw) in raw_rows.into_iter().enumerate() {
            let ticker = raw
                .get("ticker")
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or(BatchError::MissingTicker { index })?;

            let mut row = EntityRow::new(ticker);
            for (name, value) in &raw {
                if name == "ticker" {
                    continue;
                }
                let Ok(key) = name.parse::<MetricKey>() else {
                    continue;
                };
                let parsed = coerce_number(value);
                if parsed.is_none() && !value.is_null() {
                    debug!(
                        ticker,
                        metric = %key,
                        raw = %value,
                        "Non-numeric metric value treated as missing"
                    );
                }
                row.metrics.insert(key, parsed);
            }
            rows.push(row);
        }

        let batch = Self::new(rows)?;
        debug!(entities = batch.len(), "Entity batch validated");
        Ok(batch)
    }
}

impl<'a> IntoIterator for &'a EntityBatch {
    type Item = &'a EntityRow;
    type IntoIter = std::slice::Iter<'a, EntityRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[derive(Debug, Deserialize)]
struct FetchPayload {
    #[serde(default)]
    rows: Vec<serde_json::Map<String, serde_json::Value>>,
}

/// Finite numbers and numeric strings; everything else is missing.
fn coerce_number(value: &serde_json::Value) -> Option<f64> {
    let n = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Batch construction errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    #[error("Row {index} has no ticker")]
    MissingTicker { index: usize },

    #[error("Entity '{id}' appears more than once in the batch")]
    DuplicateEntity { id: String },

    #[error("Parse error in fetch payload: {0}")]
    Parse(String),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const FETCH_PAYLOAD: &str = r#"{
        "rows": [
            {"ticker": "AAPL", "pe_ratio": 28.5, "gross_margin": 44.1, "sector": "Technology"},
            {"ticker": "KO", "pe_ratio": "24.0", "gross_margin": null},
            {"ticker": "XOM", "pe_ratio": "n/a", "unknown_field": 3}
        ]
    }"#;

    #[test]
    fn test_fetch_payload_parses_metrics() {
        let batch = EntityBatch::from_fetch_json(FETCH_PAYLOAD).unwrap();
        assert_eq!(batch.len(), 3);

        let aapl = batch.get("AAPL").unwrap();
        assert_eq!(aapl.value(MetricKey::PeRatio), Some(28.5));
        assert_eq!(aapl.value(MetricKey::GrossMargin), Some(44.1));

        let ko = batch.get("KO").unwrap();
        assert_eq!(ko.value(MetricKey::PeRatio), Some(24.0));
        assert_eq!(ko.value(MetricKey::GrossMargin), None);

        let xom = batch.get("XOM").unwrap();
        assert_eq!(xom.value(MetricKey::PeRatio), None);
        assert_eq!(xom.metrics.len(), 1);
    }

    #[test]
    fn test_fetch_payload_preserves_order() {
        let batch = EntityBatch::from_fetch_json(FETCH_PAYLOAD).unwrap();
        let ids: Vec<_> = batch.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["AAPL", "KO", "XOM"]);
    }

    #[test]
    fn test_missing_ticker_rejected() {
        let err = EntityBatch::from_fetch_json(r#"{"rows": [{"pe_ratio": 10}]}"#).unwrap_err();
        assert_eq!(err, BatchError::MissingTicker { index: 0 });
    }

    #[test]
    fn test_duplicate_entity_rejected() {
        let rows = vec![EntityRow::new("A"), EntityRow::new("A")];
        let err = EntityBatch::new(rows).unwrap_err();
        assert_eq!(
            err,
            BatchError::DuplicateEntity {
                id: "A".to_string()
            }
        );
    }

    #[test]
    fn test_empty_payload_is_empty_batch() {
        let batch = EntityBatch::from_fetch_json(r#"{"rows": []}"#).unwrap();
        assert!(batch.is_empty());
        let batch = EntityBatch::from_fetch_json("{}").unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_column_reads_missing_as_none() {
        let batch = EntityBatch::new(vec![
            EntityRow::new("A").with(MetricKey::PeRatio, 10.0),
            EntityRow::new("B"),
        ])
        .unwrap();
        assert_eq!(batch.column(MetricKey::PeRatio), vec![Some(10.0), None]);
    }
}

//! # Blocks Metrics
//!
//! Shared model for the Blocks Finance analytics engine.
//!
//! ## Modules
//! - `catalog`: `MetricKey`, `MetricSpec`, `MetricCatalog` (direction, label, format)
//! - `row`: `EntityRow`, `EntityBatch` and validation of fetched rows
//!
//! Every downstream crate (ranking, insights) consumes a validated
//! `EntityBatch` and looks metric directions up in a `MetricCatalog`.

pub mod catalog;
pub mod row;

pub use catalog::{
    CatalogError, Direction, FormatClass, MetricCatalog, MetricCategory, MetricKey,
    MetricKeyParseError, MetricSpec,
};
pub use row::{BatchError, EntityBatch, EntityRow};

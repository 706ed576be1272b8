//! # Blocks Runner
//!
//! Host-side glue around the analytics crates.
//!
//! ## Modules
//! - `config`: `EngineConfig` TOML loading and validation
//! - `observability`: tracing initialisation (bounded stdout, rotated file)
//! - `pipeline`: batch → percentiles → leaderboard → insights
//!
//! The `blocks-check` binary exposes the pipeline and the recipe registry
//! on the command line.

pub mod config;
pub mod observability;
pub mod pipeline;

pub use config::{ConfigError, EngineConfig, RankingConfig, RegistryConfig};
pub use observability::{TracingGuards, init_tracing};
pub use pipeline::{AnalysisReport, Pipeline, PipelineError};

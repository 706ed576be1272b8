//! blocks-check CLI: run the analytics engine over fetched rows.
//!
//! ## Usage
//!
//! ```bash
//! # Composite leaderboard
//! blocks-check rank --rows data/rows.json --config config/engine.toml --top 20
//!
//! # Insight list
//! blocks-check insights --rows data/rows.json
//!
//! # Full report (percentiles + leaderboard + insights)
//! blocks-check report --rows data/rows.json --format json
//!
//! # Merged recipe catalog
//! blocks-check recipes --source blocks-core:core:recipes/core.json \
//!                      --source acme:third_party:plugins/acme.json \
//!                      --min-trust commons --kind screen
//! ```
//!
//! ## Exit Codes
//! - 0: Success
//! - 2: Error (missing files, invalid config or rows, bad arguments)

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use blocks_metrics::EntityBatch;
use blocks_recipes::{RecipeFilter, RecipeRegistry, RecipeSource, TrustTier};
use blocks_runner::{EngineConfig, Pipeline, init_tracing};
use clap::{Parser, Subcommand};

/// blocks-check: fundamentals ranking, insights and recipe catalog.
#[derive(Parser)]
#[command(name = "blocks-check")]
#[command(version)]
#[command(about = "Ranking, insight and recipe-catalog checks for Blocks Finance")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: text (default) or json
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Directory for rotated log files
    #[arg(long, global = true, default_value = "logs")]
    log_dir: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank rows into a composite leaderboard
    Rank {
        /// Fetch payload JSON ({"rows": [...]})
        #[arg(long, short = 'r')]
        rows: PathBuf,

        /// Engine config TOML (defaults apply when omitted)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Only print the first N leaderboard rows
        #[arg(long, short = 'n')]
        top: Option<usize>,
    },

    /// Generate insights for rows
    Insights {
        #[arg(long, short = 'r')]
        rows: PathBuf,

        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },

    /// Percentiles, leaderboard and insights in one report
    Report {
        #[arg(long, short = 'r')]
        rows: PathBuf,

        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },

    /// Merge recipe manifests and print the catalog
    Recipes {
        /// Source as id:tier:path (repeatable, merged in the given order)
        #[arg(long = "source", short = 's', value_parser = parse_source, required = true)]
        sources: Vec<SourceArg>,

        /// Minimum trust tier at load time (overrides config registry.min_trust)
        #[arg(long)]
        min_trust: Option<TrustTier>,

        /// Only list recipes of this kind
        #[arg(long, short = 'k')]
        kind: Option<String>,

        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },
}

/// Parsed `--source id:tier:path`.
#[derive(Clone, Debug, PartialEq, Eq)]
struct SourceArg {
    id: String,
    tier: TrustTier,
    path: PathBuf,
}

fn parse_source(s: &str) -> Result<SourceArg, String> {
    let mut parts = s.splitn(3, ':');
    let (Some(id), Some(tier), Some(path)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("expected id:tier:path, got '{}'", s));
    };
    if id.is_empty() || path.is_empty() {
        return Err(format!("expected id:tier:path, got '{}'", s));
    }
    let tier = tier.parse::<TrustTier>().map_err(|e| e.to_string())?;
    Ok(SourceArg {
        id: id.to_string(),
        tier,
        path: PathBuf::from(path),
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guards = init_tracing("blocks-check", &cli.log_dir);

    match run(cli) {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Rank { rows, config, top } => run_rank(&rows, config.as_deref(), top, cli.format),
        Commands::Insights { rows, config } => run_insights(&rows, config.as_deref(), cli.format),
        Commands::Report { rows, config } => run_report(&rows, config.as_deref(), cli.format),
        Commands::Recipes {
            sources,
            min_trust,
            kind,
            config,
        } => run_recipes(&sources, min_trust, kind, config.as_deref(), cli.format),
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_toml(path)
            .with_context(|| format!("loading engine config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn load_rows(path: &Path) -> Result<EntityBatch> {
    let json =
        fs::read_to_string(path).with_context(|| format!("reading rows {}", path.display()))?;
    EntityBatch::from_fetch_json(&json).with_context(|| format!("parsing rows {}", path.display()))
}

fn build_pipeline(config: Option<&Path>) -> Result<Pipeline> {
    Pipeline::with_builtin_catalog(load_config(config)?).context("validating engine config")
}

fn run_rank(
    rows: &Path,
    config: Option<&Path>,
    top: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let pipeline = build_pipeline(config)?;
    let batch = pipeline.prepare(&load_rows(rows)?)?;
    let (_, leaderboard) = pipeline.rank(&batch)?;
    let shown = match top {
        Some(n) => leaderboard.top(n),
        None => leaderboard.rows(),
    };

    match format {
        OutputFormat::Text => {
            let weights: Vec<String> = pipeline
                .config()
                .weighting
                .weights()
                .iter()
                .map(|w| format!("{}={:.2}", w.metric, w.weight))
                .collect();
            println!(
                "Leaderboard: {} entities (weighting: {})",
                leaderboard.len(),
                weights.join(", ")
            );
            for row in shown {
                println!("  #{:<4} {:<10} {:>4}", row.rank, row.id, row.score);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(shown)?);
        }
    }
    Ok(())
}

fn run_insights(rows: &Path, config: Option<&Path>, format: OutputFormat) -> Result<()> {
    let pipeline = build_pipeline(config)?;
    let report = pipeline.run(&load_rows(rows)?)?;

    match format {
        OutputFormat::Text => {
            println!("Insights: {} for {} entities", report.insights.len(), report.entity_count);
            for insight in &report.insights {
                println!(
                    "\n[{}] {} (confidence {}{})",
                    insight.category,
                    insight.title,
                    insight.confidence,
                    if insight.actionable { ", actionable" } else { "" }
                );
                println!("  {}", insight.summary);
                println!("  {}", insight.detail);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report.insights)?);
        }
    }
    Ok(())
}

fn run_report(rows: &Path, config: Option<&Path>, format: OutputFormat) -> Result<()> {
    let pipeline = build_pipeline(config)?;
    let report = pipeline.run(&load_rows(rows)?)?;

    match format {
        OutputFormat::Text => {
            println!("Report generated at {}", report.generated_at_utc);
            println!("  Entities: {}", report.entity_count);
            println!("  Ranked metrics: {}", report.percentiles.metrics().len());
            if let Some(leader) = report.leaderboard.rows().first() {
                println!("  Leader: {} (score {})", leader.id, leader.score);
            }
            println!("  Insights: {}", report.insights.len());
            for insight in &report.insights {
                println!("    - [{}] {}", insight.category, insight.title);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

fn run_recipes(
    sources: &[SourceArg],
    min_trust: Option<TrustTier>,
    kind: Option<String>,
    config: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let min_trust = match min_trust {
        Some(tier) => tier,
        None => load_config(config)?.registry.min_trust,
    };

    let loaded = sources
        .iter()
        .map(|s| {
            RecipeSource::load(&s.path, &s.id, s.tier)
                .with_context(|| format!("loading recipe source '{}'", s.id))
        })
        .collect::<Result<Vec<_>>>()?;

    let registry = RecipeRegistry::load(&loaded, min_trust);
    let filter = RecipeFilter {
        kind,
        ..RecipeFilter::default()
    };
    let listed = registry.list_recipes(&filter);

    match format {
        OutputFormat::Text => {
            println!(
                "Recipe catalog: {} entries, {} listed (min trust {}, digest {})",
                registry.len(),
                listed.len(),
                min_trust,
                registry.digest()
            );
            let mut current_kind: Option<&str> = None;
            let mut sorted = listed.clone();
            sorted.sort_by(|a, b| a.kind().cmp(b.kind()));
            for entry in sorted {
                if current_kind != Some(entry.kind()) {
                    println!("\n{}:", entry.kind());
                    current_kind = Some(entry.kind());
                }
                println!(
                    "  {:<24} {:<32} [{}, {}]",
                    entry.id(),
                    entry.recipe.name,
                    entry.source_id,
                    entry.trust_tier
                );
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&listed)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source() {
        let arg = parse_source("acme:third_party:plugins/acme.json").unwrap();
        assert_eq!(arg.id, "acme");
        assert_eq!(arg.tier, TrustTier::ThirdParty);
        assert_eq!(arg.path, PathBuf::from("plugins/acme.json"));
    }

    #[test]
    fn test_parse_source_keeps_colons_in_path() {
        let arg = parse_source("core:core:C:/recipes/core.json").unwrap();
        assert_eq!(arg.path, PathBuf::from("C:/recipes/core.json"));
    }

    #[test]
    fn test_parse_source_rejects_malformed() {
        assert!(parse_source("core:core").is_err());
        assert!(parse_source(":core:x.json").is_err());
        assert!(parse_source("a:gold:x.json").is_err());
    }

    #[test]
    fn test_cli_parses_recipes_command() {
        let cli = Cli::try_parse_from([
            "blocks-check",
            "recipes",
            "--source",
            "core:core:a.json",
            "--source",
            "acme:commons:b.json",
            "--min-trust",
            "commons",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Recipes {
                sources, min_trust, ..
            } => {
                assert_eq!(sources.len(), 2);
                assert_eq!(min_trust, Some(TrustTier::Commons));
            }
            _ => panic!("expected recipes command"),
        }
    }
}

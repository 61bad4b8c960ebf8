//! Subcommand implementations.

pub mod config;
pub mod run;

use anyhow::{Context, Result};
use cadence_concurrency::{ExecutorConfig, StrategyKind};
use std::path::Path;

/// Start from a configuration file, or the defaults, and apply flag overrides.
pub fn resolve_config(
    path: Option<&Path>,
    workers: Option<usize>,
    strategy: Option<StrategyKind>,
) -> Result<ExecutorConfig> {
    let mut config = match path {
        Some(path) => ExecutorConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => ExecutorConfig::default(),
    };

    if let Some(workers) = workers {
        config.max_concurrent = workers;
    }
    if let Some(strategy) = strategy {
        config.strategy = strategy;
    }
    config.validate().context("invalid executor settings")?;
    Ok(config)
}

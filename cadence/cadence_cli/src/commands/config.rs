//! `cadence config`

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use cadence_concurrency::ExecutorConfig;

/// Arguments for the config command
#[derive(Args)]
pub struct ConfigArgs {
    /// TOML configuration file
    #[arg(long)]
    pub config: PathBuf,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct EffectiveConfig<'a> {
    #[serde(flatten)]
    config: &'a ExecutorConfig,
    resolved_strategy: String,
    effective_resolution_ms: u128,
}

/// Implementation of the config command
pub fn execute(args: &ConfigArgs) -> Result<()> {
    let config = super::resolve_config(Some(&args.config), None, None)?;
    let resolved = config.strategy.resolve();
    let effective = EffectiveConfig {
        config: &config,
        resolved_strategy: resolved.to_string(),
        effective_resolution_ms: config.resolution_for(resolved).as_millis(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&effective)?);
        return Ok(());
    }

    println!("configuration OK: {}", args.config.display());
    println!("  max_concurrent     = {}", config.max_concurrent);
    println!(
        "  strategy           = {} (resolves to {})",
        config.strategy, effective.resolved_strategy
    );
    println!("  resolution_ms      = {}", effective.effective_resolution_ms);
    println!("  queue_size         = {}", config.queue_size);
    println!("  thread_name_prefix = {}", config.thread_name_prefix);
    Ok(())
}

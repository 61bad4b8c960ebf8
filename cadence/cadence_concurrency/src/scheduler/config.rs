//! Executor configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration.

use cadence_core::error::{ConfigError, Result};
use cadence_core::utils::config::{load_toml, parse_toml};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::pool::ThreadPoolConfig;
use crate::scheduler::cooperative::{CooperativeStrategy, DEFAULT_COOPERATIVE_RESOLUTION};
use crate::scheduler::pool_strategy::DEFAULT_POOL_RESOLUTION;

/// Which scheduling mechanism an executor uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Pick by platform capability
    #[default]
    Auto,

    /// Bounded worker pool with a timer thread
    ThreadPool,

    /// Single control loop running tasks inline
    Cooperative,
}

impl StrategyKind {
    /// Resolve [`Auto`](Self::Auto) for the current target.
    pub fn resolve(self) -> Self {
        match self {
            Self::Auto if CooperativeStrategy::THREADS_AVAILABLE => Self::ThreadPool,
            Self::Auto => Self::Cooperative,
            other => other,
        }
    }

    /// The name used in configuration files and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::ThreadPool => "thread-pool",
            Self::Cooperative => "cooperative",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "thread-pool" => Ok(Self::ThreadPool),
            "cooperative" => Ok(Self::Cooperative),
            other => Err(ConfigError::Invalid(format!(
                "unknown strategy `{}` (expected auto, thread-pool or cooperative)",
                other
            ))),
        }
    }
}

/// Executor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Upper bound on simultaneously executing tasks (pool size)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Scheduling mechanism
    #[serde(default)]
    pub strategy: StrategyKind,

    /// Wait tick in milliseconds; `None` uses the strategy default
    #[serde(default)]
    pub resolution_ms: Option<u64>,

    /// Capacity of the worker pool's job queue
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,

    /// Name prefix for threads the executor spawns
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
}

fn default_max_concurrent() -> usize {
    1
}

fn default_queue_size() -> usize {
    1024
}

fn default_thread_name_prefix() -> String {
    "cadence-worker".to_string()
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            strategy: StrategyKind::default(),
            resolution_ms: None,
            queue_size: default_queue_size(),
            thread_name_prefix: default_thread_name_prefix(),
        }
    }
}

impl ExecutorConfig {
    /// Defaults with `max_concurrent` substituted.
    pub fn with_max_concurrent(max_concurrent: usize) -> Self {
        Self {
            max_concurrent,
            ..Default::default()
        }
    }

    /// One worker per logical CPU.
    pub fn per_core() -> Self {
        Self::with_max_concurrent(num_cpus::get())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = parse_toml(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = load_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no executor can run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(ConfigError::Invalid("max_concurrent must be at least 1".into()).into());
        }
        if self.queue_size == 0 {
            return Err(ConfigError::Invalid("queue_size must be at least 1".into()).into());
        }
        if self.resolution_ms == Some(0) {
            return Err(ConfigError::Invalid("resolution_ms must be at least 1".into()).into());
        }
        Ok(())
    }

    /// Wait tick for the given (resolved) strategy.
    pub fn resolution_for(&self, strategy: StrategyKind) -> Duration {
        match (self.resolution_ms, strategy) {
            (Some(ms), _) => Duration::from_millis(ms),
            (None, StrategyKind::Cooperative) => DEFAULT_COOPERATIVE_RESOLUTION,
            (None, _) => DEFAULT_POOL_RESOLUTION,
        }
    }

    pub(crate) fn pool_config(&self) -> ThreadPoolConfig {
        ThreadPoolConfig {
            queue_size: self.queue_size,
            max_threads: self.max_concurrent,
            thread_name_prefix: self.thread_name_prefix.clone(),
        }
    }
}

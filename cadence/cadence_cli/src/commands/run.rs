//! `cadence run`
//!
//! Submits `--tasks` probe tasks on one schedule. Each probe returns its own
//! run number; with `--fail-every K` every K-th run of a probe fails instead.
//! After `--wait-ms` the executor is stopped and one line per task is printed.

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use log::info;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cadence_concurrency::{Executor, ExecutorConfig, StrategyKind, Task, TaskFuture};
use cadence_core::types::{FutureResult, Schedule, Timeout};

/// Probe schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScheduleKind {
    /// A single run after the delay
    Once,
    /// Repeat every period until the executor stops
    Interval,
    /// Repeat every period, `--runs` times
    Limited,
}

/// Arguments for the run command
#[derive(Args)]
pub struct RunArgs {
    /// Number of probe tasks
    #[arg(long, default_value_t = 3)]
    pub tasks: usize,

    /// Probe schedule
    #[arg(long, value_enum, default_value_t = ScheduleKind::Once)]
    pub schedule: ScheduleKind,

    /// Spacing between runs for recurring schedules
    #[arg(long, default_value_t = 50, allow_negative_numbers = true)]
    pub period_ms: i64,

    /// Delay before each probe's first run
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub delay_ms: i64,

    /// Run count for the limited schedule
    #[arg(long, default_value_t = 3)]
    pub runs: u32,

    /// Worker count (overrides the config file)
    #[arg(long)]
    pub workers: Option<usize>,

    /// One worker per logical CPU (overrides the config file)
    #[arg(long, conflicts_with = "workers")]
    pub per_core: bool,

    /// Scheduling strategy: auto, thread-pool or cooperative
    #[arg(long)]
    pub strategy: Option<StrategyKind>,

    /// Fail every K-th run of each probe
    #[arg(long)]
    pub fail_every: Option<u64>,

    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// How long to let the probes run before stopping
    #[arg(long, default_value_t = 500)]
    pub wait_ms: u64,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    fn workers(&self) -> Option<usize> {
        if self.per_core {
            Some(ExecutorConfig::per_core().max_concurrent)
        } else {
            self.workers
        }
    }

    fn schedule(&self) -> Schedule {
        match self.schedule {
            ScheduleKind::Once => Schedule::once_after(self.delay_ms),
            ScheduleKind::Interval => Schedule::every_after(self.delay_ms, self.period_ms),
            ScheduleKind::Limited => Schedule::Limited {
                delay_ms: self.delay_ms,
                period_ms: self.period_ms,
                runs: self.runs,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct TaskReport {
    task: usize,
    id: String,
    runs: u64,
    stopped: bool,
    outcome: &'static str,
    value: Option<u64>,
    error: Option<String>,
}

impl TaskReport {
    fn new(task: usize, future: &TaskFuture<u64>) -> Self {
        let result = future.result();
        let outcome = match &result {
            FutureResult::None => "none",
            FutureResult::Success { .. } => "success",
            FutureResult::Failure { .. } => "failure",
        };
        Self {
            task,
            id: future.id().to_string(),
            runs: future.runs(),
            stopped: future.is_stopped(),
            outcome,
            value: result.value().copied(),
            error: result.error().map(|e| e.message().to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct RunReport {
    executor: String,
    strategy: &'static str,
    max_concurrent: usize,
    state: String,
    terminated: bool,
    observed_results: usize,
    tasks: Vec<TaskReport>,
}

fn probe(task: usize, fail_every: Option<u64>) -> Task<u64> {
    let mut run = 0u64;
    Task::fallible(move || {
        run += 1;
        match fail_every {
            Some(k) if run % k == 0 => Err(format!("probe {} failed on run {}", task, run)),
            _ => Ok(run),
        }
    })
}

/// Wait for every future to stop, or until the deadline.
fn wait_all(futures: &[TaskFuture<u64>], deadline: Instant) {
    for future in futures {
        loop {
            let now = Instant::now();
            if future.is_stopped() || now >= deadline {
                break;
            }
            future.wait_for_next(Timeout::Bounded(deadline - now), future.runs());
        }
    }
}

/// Implementation of the run command
pub fn execute(args: &RunArgs) -> Result<()> {
    if args.fail_every == Some(0) {
        bail!("--fail-every must be at least 1");
    }

    let config = super::resolve_config(args.config.as_deref(), args.workers(), args.strategy)?;
    let executor = Executor::with_config(config).context("failed to start executor")?;

    let observed = Arc::new(AtomicUsize::new(0));
    {
        let observed = Arc::clone(&observed);
        executor.set_on_result(move |_| {
            observed.fetch_add(1, Ordering::SeqCst);
        });
    }

    let schedule = args.schedule();
    let futures = (0..args.tasks)
        .map(|task| executor.submit(probe(task, args.fail_every), schedule))
        .collect::<Result<Vec<_>, _>>()
        .context("failed to submit probe tasks")?;
    info!(
        "Submitted {} probes to executor {} ({:?})",
        futures.len(),
        executor.id(),
        schedule
    );

    wait_all(&futures, Instant::now() + Duration::from_millis(args.wait_ms));

    executor.stop();
    let terminated = executor.await_termination(Timeout::Bounded(Duration::from_secs(5)));
    let stats = executor.stats();

    let report = RunReport {
        executor: executor.id().to_string(),
        strategy: stats.strategy,
        max_concurrent: executor.config().max_concurrent,
        state: stats.state.to_string(),
        terminated,
        observed_results: observed.load(Ordering::SeqCst),
        tasks: futures
            .iter()
            .enumerate()
            .map(|(task, future)| TaskReport::new(task, future))
            .collect(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text(&report);
    }

    if !terminated {
        bail!("executor did not terminate");
    }
    Ok(())
}

fn print_text(report: &RunReport) {
    println!(
        "executor {} ({}) {}, {} results observed",
        report.executor, report.strategy, report.state, report.observed_results
    );
    for task in &report.tasks {
        let detail = match (&task.value, &task.error) {
            (Some(value), _) => format!("value={}", value),
            (_, Some(error)) => format!("error={}", error),
            _ => String::new(),
        };
        println!(
            "task {} {} runs={} stopped={} {} {}",
            task.task, task.id, task.runs, task.stopped, task.outcome, detail
        );
    }
}

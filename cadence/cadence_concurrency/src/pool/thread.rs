//! Fixed-size worker pool.
//!
//! Jobs are closures sent over a bounded channel to `max_threads` named
//! worker threads. Shutdown closes the channel: workers drain whatever was
//! already queued and then exit, so accepted jobs always run.

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, info, trace};
use parking_lot::Mutex;
use std::io;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use thiserror::Error;

/// Error when submitting a job to the thread pool
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ThreadPoolError {
    /// The thread pool is shutting down
    #[error("thread pool is shutting down")]
    ShuttingDown,
}

/// Statistics about the thread pool
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ThreadPoolStats {
    /// Number of jobs queued
    pub jobs_queued: usize,

    /// Number of jobs completed
    pub jobs_completed: usize,

    /// Number of jobs that panicked
    pub jobs_panicked: usize,

    /// Total job execution time (microseconds)
    pub total_execution_time_us: u64,

    /// Total queue wait time (microseconds)
    pub total_queue_time_us: u64,

    /// Maximum job execution time (microseconds)
    pub max_execution_time_us: u64,
}

/// Configuration for the thread pool
#[derive(Debug, Clone)]
pub struct ThreadPoolConfig {
    /// Maximum number of queued jobs
    pub queue_size: usize,

    /// Number of worker threads
    pub max_threads: usize,

    /// Name prefix for worker threads
    pub thread_name_prefix: String,
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            queue_size: 1024,
            max_threads: num_cpus::get(),
            thread_name_prefix: "cadence-worker".to_string(),
        }
    }
}

/// Closure with its enqueue time
struct PoolJob {
    func: Box<dyn FnOnce() + Send + 'static>,
    enqueued_at: Instant,
}

/// Counters shared between the pool handle and its workers
#[derive(Debug, Default)]
struct PoolCounters {
    jobs_queued: AtomicUsize,
    jobs_completed: AtomicUsize,
    jobs_panicked: AtomicUsize,
    total_execution_time_us: AtomicUsize,
    total_queue_time_us: AtomicUsize,
    max_execution_time_us: AtomicUsize,
}

impl PoolCounters {
    fn record_execution(&self, exec_time_us: usize) {
        self.total_execution_time_us
            .fetch_add(exec_time_us, Ordering::Relaxed);

        let mut current_max = self.max_execution_time_us.load(Ordering::Relaxed);
        while exec_time_us > current_max {
            match self.max_execution_time_us.compare_exchange(
                current_max,
                exec_time_us,
                Ordering::SeqCst,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current_max = actual,
            }
        }
    }
}

/// A fixed-size pool of worker threads
pub struct ThreadPool {
    /// Sending half of the job channel; `None` once shut down
    sender: Mutex<Option<Sender<PoolJob>>>,

    /// Worker threads
    workers: Mutex<Vec<JoinHandle<()>>>,

    /// Statistics counters
    counters: Arc<PoolCounters>,
}

impl ThreadPool {
    /// Create a pool with `threads` workers and default settings.
    pub fn new(threads: usize) -> io::Result<Self> {
        Self::with_config(ThreadPoolConfig {
            max_threads: threads,
            ..Default::default()
        })
    }

    /// Create a pool with the specified configuration.
    ///
    /// Fails if a worker thread cannot be spawned; workers that did start
    /// exit once the partially built pool is dropped.
    pub fn with_config(config: ThreadPoolConfig) -> io::Result<Self> {
        let (sender, receiver) = bounded(config.queue_size.max(1));
        let counters = Arc::new(PoolCounters::default());

        info!(
            "Creating thread pool with {} workers and queue size {}",
            config.max_threads, config.queue_size
        );

        let mut workers = Vec::with_capacity(config.max_threads);
        for id in 0..config.max_threads {
            let receiver = receiver.clone();
            let counters = Arc::clone(&counters);

            let handle = thread::Builder::new()
                .name(format!("{}-{}", config.thread_name_prefix, id))
                .spawn(move || Self::worker_loop(id, receiver, counters))?;
            workers.push(handle);
        }

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            counters,
        })
    }

    /// Worker thread main loop
    fn worker_loop(id: usize, receiver: Receiver<PoolJob>, counters: Arc<PoolCounters>) {
        debug!("Worker {}: Starting", id);

        // recv() fails only once the channel is closed and drained
        while let Ok(job) = receiver.recv() {
            let queue_time = job.enqueued_at.elapsed();
            counters
                .total_queue_time_us
                .fetch_add(queue_time.as_micros() as usize, Ordering::Relaxed);

            trace!(
                "Worker {}: Executing job (queue time: {:.2}ms)",
                id,
                queue_time.as_micros() as f64 / 1000.0
            );

            let exec_start = Instant::now();
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job.func));
            let exec_time = exec_start.elapsed();
            counters.record_execution(exec_time.as_micros() as usize);

            match result {
                Ok(()) => {
                    counters.jobs_completed.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    error!(
                        "Worker {}: Job panicked: {}",
                        id,
                        crate::scheduler::task::panic_message(e.as_ref())
                    );
                    counters.jobs_panicked.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        debug!("Worker {}: Shutting down", id);
    }

    /// Queue a job, blocking while the queue is full.
    pub fn execute_blocking<F>(&self, f: F) -> Result<(), ThreadPoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender()?;
        let job = PoolJob {
            func: Box::new(f),
            enqueued_at: Instant::now(),
        };

        sender
            .send(job)
            .map_err(|_| ThreadPoolError::ShuttingDown)?;
        self.counters.jobs_queued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn sender(&self) -> Result<Sender<PoolJob>, ThreadPoolError> {
        self.sender
            .lock()
            .as_ref()
            .cloned()
            .ok_or(ThreadPoolError::ShuttingDown)
    }

    /// Get current statistics for the thread pool
    pub fn stats(&self) -> ThreadPoolStats {
        let c = &self.counters;
        ThreadPoolStats {
            jobs_queued: c.jobs_queued.load(Ordering::Relaxed),
            jobs_completed: c.jobs_completed.load(Ordering::Relaxed),
            jobs_panicked: c.jobs_panicked.load(Ordering::Relaxed),
            total_execution_time_us: c.total_execution_time_us.load(Ordering::Relaxed) as u64,
            total_queue_time_us: c.total_queue_time_us.load(Ordering::Relaxed) as u64,
            max_execution_time_us: c.max_execution_time_us.load(Ordering::Relaxed) as u64,
        }
    }

    /// Stop accepting jobs. Jobs already queued still run.
    pub fn shutdown(&self) {
        if self.sender.lock().take().is_some() {
            info!("Shutting down thread pool");
        }
    }

    /// Get the number of worker threads
    pub fn worker_count(&self) -> usize {
        self.workers.lock().len()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
        // Workers are detached; they exit once the queue is drained.
        debug!("Thread pool dropped - workers will exit after draining the queue");
    }
}

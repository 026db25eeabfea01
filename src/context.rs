//! Execution context: the thread pool used for assembly and a registry of named timings.
use crate::error::{Error, Result};
use log::debug;
use parking_lot::Mutex;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Number of worker threads. `None` uses rayon's default.
    pub num_threads: Option<usize>,
    /// Evaluate local kernels in parallel.
    pub parallel_assembly: bool,
    /// Number of entities whose local tensors are computed in one parallel batch.
    pub chunk_size: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            parallel_assembly: false,
            chunk_size: 1024,
        }
    }
}

impl ContextConfig {
    pub fn parallel() -> Self {
        Self {
            parallel_assembly: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingEntry {
    pub count: usize,
    pub total: Duration,
    pub min: Duration,
    pub max: Duration,
}

impl TimingEntry {
    fn new(elapsed: Duration) -> Self {
        Self {
            count: 1,
            total: elapsed,
            min: elapsed,
            max: elapsed,
        }
    }

    fn record(&mut self, elapsed: Duration) {
        self.count += 1;
        self.total += elapsed;
        self.min = self.min.min(elapsed);
        self.max = self.max.max(elapsed);
    }

    pub fn average(&self) -> Duration {
        self.total / self.count as u32
    }
}

#[derive(Debug)]
struct ContextInner {
    config: ContextConfig,
    pool: Option<ThreadPool>,
    timings: Mutex<BTreeMap<String, TimingEntry>>,
}

/// A cheaply cloneable handle to shared execution state.
///
/// Create one at start-up and pass it to the objects that need it, instead of relying on
/// process-global settings.
#[derive(Debug, Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Default for Context {
    fn default() -> Self {
        Self::from_parts(ContextConfig::default(), None)
    }
}

impl Context {
    pub fn new(config: ContextConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(Error::InvalidConfiguration("chunk size must be positive".to_string()));
        }
        let pool = match config.num_threads {
            Some(0) => {
                return Err(Error::InvalidConfiguration(
                    "number of threads must be positive".to_string(),
                ))
            }
            Some(num_threads) => Some(
                ThreadPoolBuilder::new()
                    .num_threads(num_threads)
                    .build()
                    .map_err(|err| Error::InvalidConfiguration(format!("failed to build thread pool: {}", err)))?,
            ),
            None => None,
        };
        debug!("Created context with {:?}", config);
        Ok(Self::from_parts(config, pool))
    }

    fn from_parts(config: ContextConfig, pool: Option<ThreadPool>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                config,
                pool,
                timings: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.inner.config
    }

    pub fn parallel_assembly(&self) -> bool {
        self.inner.config.parallel_assembly
    }

    pub fn chunk_size(&self) -> usize {
        self.inner.config.chunk_size
    }

    /// Runs `op` on the context's thread pool, or on the global rayon pool if the context
    /// does not own one.
    pub fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.inner.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    /// Starts timing a task. The elapsed time is recorded under `name` when the returned guard
    /// is dropped.
    pub fn timer(&self, name: impl Into<String>) -> Timer<'_> {
        Timer {
            context: self,
            name: name.into(),
            start: Instant::now(),
        }
    }

    pub fn record_timing(&self, name: &str, elapsed: Duration) {
        let mut timings = self.inner.timings.lock();
        match timings.get_mut(name) {
            Some(entry) => entry.record(elapsed),
            None => {
                timings.insert(name.to_string(), TimingEntry::new(elapsed));
            }
        }
    }

    pub fn timing(&self, name: &str) -> Option<TimingEntry> {
        self.inner.timings.lock().get(name).copied()
    }

    /// All recorded timings, ordered by name.
    pub fn timings(&self) -> Vec<(String, TimingEntry)> {
        self.inner
            .timings
            .lock()
            .iter()
            .map(|(name, entry)| (name.clone(), *entry))
            .collect()
    }

    /// Formats all recorded timings as a table.
    pub fn list_timings(&self) -> String {
        let timings = self.timings();
        let width = timings
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0)
            .max("Task".len());
        let mut table = String::new();
        let _ = writeln!(
            table,
            "{:<width$} | {:>6} | {:>12} | {:>12} | {:>12} | {:>12}",
            "Task",
            "Count",
            "Total [s]",
            "Avg [s]",
            "Min [s]",
            "Max [s]",
            width = width
        );
        let _ = writeln!(table, "{}", "-".repeat(width + 69));
        for (name, entry) in timings {
            let _ = writeln!(
                table,
                "{:<width$} | {:>6} | {:>12.6} | {:>12.6} | {:>12.6} | {:>12.6}",
                name,
                entry.count,
                entry.total.as_secs_f64(),
                entry.average().as_secs_f64(),
                entry.min.as_secs_f64(),
                entry.max.as_secs_f64(),
                width = width
            );
        }
        table
    }

    pub fn clear_timings(&self) {
        self.inner.timings.lock().clear();
    }
}

/// Records the time between its creation and its drop on the owning [`Context`].
#[derive(Debug)]
pub struct Timer<'a> {
    context: &'a Context,
    name: String,
    start: Instant,
}

impl<'a> Timer<'a> {
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl<'a> Drop for Timer<'a> {
    fn drop(&mut self) {
        self.context.record_timing(&self.name, self.start.elapsed());
    }
}

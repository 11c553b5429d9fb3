//! Worker pool configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a [`WorkerPool`](crate::WorkerPool).
///
/// Deserializable from JSON for file-driven setups, with builder-style
/// setters for programmatic ones:
///
/// ```
/// use bounded_pool::PoolConfig;
///
/// let cfg = PoolConfig::new().with_workers(4).with_queue_capacity(32);
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of dedicated worker threads.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Task queue capacity; blocking submissions stall once this many
    /// tasks are outstanding.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Stack size for worker threads, in bytes.
    #[serde(default = "default_thread_stack_size")]
    pub thread_stack_size: usize,
    /// Prefix for worker thread names (`<prefix>-<id>`).
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
}

fn default_workers() -> usize {
    num_cpus::get()
}

const fn default_queue_capacity() -> usize {
    64
}

const fn default_thread_stack_size() -> usize {
    2 * 1024 * 1024
}

fn default_thread_name_prefix() -> String {
    "bp-worker".into()
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolConfig {
    /// Defaults: one worker per logical CPU, queue capacity 64, 2 MiB
    /// stacks, `bp-worker` thread names.
    #[must_use]
    pub fn new() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            thread_stack_size: default_thread_stack_size(),
            thread_name_prefix: default_thread_name_prefix(),
        }
    }

    /// Set the number of worker threads.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the task queue capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the worker thread stack size in bytes.
    #[must_use]
    pub fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = bytes;
        self
    }

    /// Set the worker thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err("workers must be greater than 0".into());
        }
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be greater than 0".into());
        }
        if self.thread_stack_size == 0 {
            return Err("thread_stack_size must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse a pool configuration from a JSON string and validate it.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse failure or of the first invalid
    /// field.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

//! Delayed retry queue for module initialization
//!
//! Each failed attempt that is still under its ceiling becomes a
//! `RetryTask` carrying the attempt number and the instant it falls due.
//! At most one task is pending per module.

use std::time::Duration;
use tokio::time::Instant;

/// A scheduled re-entry into module initialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryTask {
    /// Module to retry
    pub module: String,
    /// Attempt that failed and caused this retry
    pub attempt: u32,
    /// When the retry should run
    pub due: Instant,
}

/// Ordered queue of pending retries
#[derive(Debug, Default)]
pub struct RetryQueue {
    tasks: Vec<RetryTask>,
}

impl RetryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a retry of `module` after `delay`.
    ///
    /// Returns false if a retry for the module is already pending; the
    /// earlier task is kept.
    pub fn schedule(&mut self, module: &str, attempt: u32, delay: Duration) -> bool {
        if self.is_pending(module) {
            return false;
        }

        let task = RetryTask {
            module: module.to_string(),
            attempt,
            due: Instant::now() + delay,
        };
        let index = self.tasks.partition_point(|t| t.due <= task.due);
        self.tasks.insert(index, task);
        true
    }

    /// Drop a pending retry for `module`
    pub fn cancel(&mut self, module: &str) {
        self.tasks.retain(|t| t.module != module);
    }

    /// Whether a retry is pending for `module`
    pub fn is_pending(&self, module: &str) -> bool {
        self.tasks.iter().any(|t| t.module == module)
    }

    /// Instant the earliest task falls due
    pub fn next_due(&self) -> Option<Instant> {
        self.tasks.first().map(|t| t.due)
    }

    /// Remove and return every task due at or before `now`, earliest first
    pub fn take_due(&mut self, now: Instant) -> Vec<RetryTask> {
        let split = self.tasks.partition_point(|t| t.due <= now);
        self.tasks.drain(..split).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

//! Development error tracing.
//!
//! API misuse inside the pipeline (re-triggering a busy rangefinder, reading
//! before a result exists, ...) is never fatal, but it should not vanish
//! either.  Tasks report such errors to an [`ErrorTracer`], which logs each
//! report and keeps the most recent entries in a fixed-capacity ring for a
//! supervisor or debugger to inspect.  When the ring is full the oldest
//! entry is dropped.

use heapless::Deque;
use log::warn;

use crate::error::Error;

/// Entries kept before the oldest is overwritten.
pub const HISTORY_CAP: usize = 8;

/// Component that reported an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleId {
    RangeReader,
}

/// Operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiId {
    Trigger,
    Read,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorEntry {
    pub module: ModuleId,
    pub api: ApiId,
    pub error: Error,
    /// Scheduler time (ms) at which the error was reported.
    pub timestamp_ms: u32,
}

#[derive(Debug)]
pub struct ErrorTracer {
    history: Deque<ErrorEntry, HISTORY_CAP>,
    total: u32,
    now_ms: u32,
}

impl Default for ErrorTracer {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorTracer {
    pub fn new() -> Self {
        Self {
            history: Deque::new(),
            total: 0,
            now_ms: 0,
        }
    }

    /// Update the timestamp used for subsequent reports.
    pub fn set_time(&mut self, now_ms: u32) {
        self.now_ms = now_ms;
    }

    pub fn report(&mut self, module: ModuleId, api: ApiId, error: impl Into<Error>) {
        let error = error.into();
        warn!("det: {:?}::{:?} failed: {}", module, api, error);

        if self.history.is_full() {
            self.history.pop_front();
        }
        // Cannot fail: a slot was freed above.
        let _ = self.history.push_back(ErrorEntry {
            module,
            api,
            error,
            timestamp_ms: self.now_ms,
        });
        self.total = self.total.saturating_add(1);
    }

    pub fn last(&self) -> Option<&ErrorEntry> {
        self.history.back()
    }

    /// Entries still held, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ErrorEntry> {
        self.history.iter()
    }

    /// Entries still held.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Reports since boot (or the last `clear`), including dropped ones.
    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.total = 0;
    }
}

//! Bounded write log tee'd during index maintenance.
//!
//! While `Database::optimize_index` clones and rebuilds an index off to the
//! side, concurrent writers keep mutating the live one directly *and* append
//! here. Once the clone finishes, its replay applies this log in order and
//! the façade swaps it in. If the log grows past `warn_threshold` before
//! replay starts, maintenance aborts with [`crate::Error::Busy`] rather than
//! replay an unbounded backlog.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::backend::IndexBackend;
use crate::error::{Error, Result};
use crate::vector::VectorId;

/// Default point at which [`WriteLog::log_insert`]/[`WriteLog::log_remove`]
/// start returning `false` to signal the caller that maintenance should
/// consider aborting.
pub const DEFAULT_WARN_THRESHOLD: usize = 50_000;
/// Hard cap on buffered entries. Past this point [`WriteLog::log_insert`]/
/// [`WriteLog::log_remove`] stop appending entirely, bounding the log's
/// memory regardless of whether a caller acts on the `warn_threshold` signal.
pub const DEFAULT_MAX_ENTRIES: usize = 100_000;

#[derive(Debug, Clone)]
pub enum WriteLogEntry {
    Insert { id: VectorId, vector: Vec<f32> },
    Remove { id: VectorId },
}

/// Ordered, size-bounded record of writes made during maintenance.
pub struct WriteLog {
    entries: Mutex<VecDeque<WriteLogEntry>>,
    enabled: AtomicBool,
    warn_threshold: usize,
    max_entries: usize,
}

impl WriteLog {
    pub fn new() -> Self {
        Self::with_thresholds(DEFAULT_WARN_THRESHOLD, DEFAULT_MAX_ENTRIES)
    }

    /// Sets only the soft `warn_threshold`; the hard cap stays at
    /// [`DEFAULT_MAX_ENTRIES`] (raised to match if `warn_threshold` exceeds it).
    pub fn with_threshold(warn_threshold: usize) -> Self {
        Self::with_thresholds(warn_threshold, DEFAULT_MAX_ENTRIES.max(warn_threshold))
    }

    pub fn with_thresholds(warn_threshold: usize, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            enabled: AtomicBool::new(false),
            warn_threshold,
            max_entries,
        }
    }

    /// Starts tee-ing writes. Called at the top of `optimize_index`.
    pub fn enable(&self) {
        self.entries.lock().expect("write log poisoned").clear();
        self.enabled.store(true, Ordering::SeqCst);
    }

    /// Stops tee-ing writes, discarding any buffered entries. Always called
    /// before `optimize_index` returns, success or failure.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        self.entries.lock().expect("write log poisoned").clear();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Appends an insert. Returns `false` if this pushed the log past
    /// `warn_threshold` (the caller should treat maintenance as failed and
    /// call [`disable`](Self::disable)). Once the log reaches `max_entries`
    /// it stops growing entirely: further writes are dropped rather than
    /// buffered, bounding memory even if a caller ignores a `false` return.
    pub fn log_insert(&self, id: VectorId, vector: &[f32]) -> bool {
        if !self.is_enabled() {
            return true;
        }
        let mut entries = self.entries.lock().expect("write log poisoned");
        if entries.len() >= self.max_entries {
            return false;
        }
        entries.push_back(WriteLogEntry::Insert { id, vector: vector.to_vec() });
        entries.len() <= self.warn_threshold
    }

    /// Appends a remove. Same overflow contract as [`log_insert`](Self::log_insert).
    pub fn log_remove(&self, id: VectorId) -> bool {
        if !self.is_enabled() {
            return true;
        }
        let mut entries = self.entries.lock().expect("write log poisoned");
        if entries.len() >= self.max_entries {
            return false;
        }
        entries.push_back(WriteLogEntry::Remove { id });
        entries.len() <= self.warn_threshold
    }

    pub fn size(&self) -> usize {
        self.entries.lock().expect("write log poisoned").len()
    }

    /// Applies every buffered entry to `target`, in order. A remove-then-add
    /// sequence for the same id collapses to an overwrite rather than an
    /// error: the log reflects what clients actually did while maintenance
    /// ran, and a duplicate-id rejection would contradict that.
    pub fn replay_to(&self, target: &dyn IndexBackend) -> Result<()> {
        let entries: Vec<WriteLogEntry> = self.entries.lock().expect("write log poisoned").drain(..).collect();
        for entry in entries {
            match entry {
                WriteLogEntry::Insert { id, vector } => match target.add(id, &vector) {
                    Ok(()) => {}
                    Err(Error::InvalidState(_)) => {
                        target.remove(id).ok();
                        target.add(id, &vector)?;
                    }
                    Err(e) => return Err(e),
                },
                WriteLogEntry::Remove { id } => match target.remove(id) {
                    Ok(()) | Err(Error::VectorNotFound(_)) => {}
                    Err(e) => return Err(e),
                },
            }
        }
        Ok(())
    }
}

impl Default for WriteLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceMetric;
    use crate::flat::FlatIndex;

    #[test]
    fn disabled_log_accepts_without_buffering() {
        let log = WriteLog::new();
        assert!(log.log_insert(1, &[0.0]));
        assert_eq!(log.size(), 0);
    }

    #[test]
    fn enabled_log_buffers_entries() {
        let log = WriteLog::new();
        log.enable();
        log.log_insert(1, &[0.0]);
        log.log_remove(2);
        assert_eq!(log.size(), 2);
    }

    #[test]
    fn overflow_past_warn_threshold_reports_false() {
        let log = WriteLog::with_threshold(2);
        log.enable();
        assert!(log.log_insert(1, &[0.0]));
        assert!(log.log_insert(2, &[0.0]));
        assert!(!log.log_insert(3, &[0.0]));
    }

    #[test]
    fn hard_cap_stops_buffering_past_max_entries() {
        let log = WriteLog::with_thresholds(1, 2);
        log.enable();
        assert!(log.log_insert(1, &[0.0]));
        assert!(!log.log_insert(2, &[0.0]));
        assert!(!log.log_insert(3, &[0.0]));
        assert_eq!(log.size(), 2);
    }

    #[test]
    fn replay_applies_inserts_and_removes_in_order() {
        let log = WriteLog::new();
        log.enable();
        log.log_insert(1, &[1.0]);
        log.log_insert(2, &[2.0]);
        log.log_remove(1);

        let target = FlatIndex::new(1, DistanceMetric::L2);
        log.replay_to(&target).unwrap();

        assert!(!target.contains(1));
        assert!(target.contains(2));
    }

    #[test]
    fn replay_collapses_remove_then_add_to_overwrite() {
        let log = WriteLog::new();
        let target = FlatIndex::new(1, DistanceMetric::L2);
        target.add(1, &[1.0]).unwrap();

        log.enable();
        log.log_remove(1);
        log.log_insert(1, &[9.0]);
        log.replay_to(&target).unwrap();

        assert!(target.contains(1));
    }
}

//! Undo/redo bookkeeping over persisted snapshots.
//!
//! Every save gets a fresh, strictly increasing index. The manager only
//! tracks the retained window `[min, max]`, the current position `cur` and
//! whether a load is running; reading and writing snapshots is left to the
//! viewport, which owns the stores.

use crate::storage::{RecordKey, StorageError};
use std::cell::Cell;
use std::rc::Rc;
use thiserror::Error;

/// History errors.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("History store is not open yet")]
    StoreUnavailable,
    #[error("Unable to save: evicting further would remove active snapshot {active}")]
    Unrecoverable { active: RecordKey },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The retained history window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryIndex {
    /// Oldest retained snapshot.
    pub min: RecordKey,
    /// Snapshot currently shown.
    pub cur: RecordKey,
    /// Newest snapshot reachable by redo.
    pub max: RecordKey,
}

impl HistoryIndex {
    /// Window before the first save. `cur < min` until something is saved.
    pub fn initial() -> Self {
        Self { min: 1, cur: 0, max: 0 }
    }

    pub fn can_undo(&self) -> bool {
        self.cur > self.min
    }

    pub fn can_redo(&self) -> bool {
        self.cur < self.max
    }
}

impl Default for HistoryIndex {
    fn default() -> Self {
        Self::initial()
    }
}

/// Clears the load-in-progress flag when dropped.
///
/// Dropping a load future halfway still releases the flag, so saves cannot
/// stay blocked forever.
#[derive(Debug)]
pub struct LoadGuard {
    loading: Rc<Cell<bool>>,
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        self.loading.set(false);
    }
}

/// Tracks the history window and the load-in-progress flag.
#[derive(Debug, Default)]
pub struct HistoryManager {
    index: HistoryIndex,
    loading: Rc<Cell<bool>>,
    /// Index shown before the save in progress; its record must survive eviction.
    saving_from: Option<RecordKey>,
    /// Evicted indices whose records still have to be deleted from the store.
    pending_evictions: Vec<RecordKey>,
}

impl HistoryManager {
    pub fn new(index: HistoryIndex) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    pub fn index(&self) -> HistoryIndex {
        self.index
    }

    pub fn is_loading(&self) -> bool {
        self.loading.get()
    }

    /// Claim the next index for a save, discarding any redo branch.
    ///
    /// Returns `None` while a load is in progress.
    pub fn begin_save(&mut self) -> Option<RecordKey> {
        if self.is_loading() {
            log::debug!("Skipping save while a load is in progress");
            return None;
        }
        self.saving_from = Some(self.index.cur);
        self.index.cur += 1;
        self.index.max = self.index.cur;
        Some(self.index.cur)
    }

    /// The snapshot for the claimed index was written.
    pub fn finish_save(&mut self) {
        self.saving_from = None;
    }

    /// Undo a `begin_save` whose write failed, so no index is left without a record.
    ///
    /// Evictions made while trying to save stay in effect; they never reach
    /// the index shown before the save.
    pub fn abort_save(&mut self, previous: HistoryIndex) {
        self.saving_from = None;
        self.index.cur = previous.cur;
        self.index.max = previous.max;
    }

    /// Move one step back. Returns the new current index, or `None` at the boundary.
    pub fn step_back(&mut self) -> Option<RecordKey> {
        if !self.index.can_undo() {
            return None;
        }
        self.index.cur -= 1;
        Some(self.index.cur)
    }

    /// Move one step forward. Returns the new current index, or `None` at the boundary.
    pub fn step_forward(&mut self) -> Option<RecordKey> {
        if !self.index.can_redo() {
            return None;
        }
        self.index.cur += 1;
        Some(self.index.cur)
    }

    /// Mark a load as running until the returned guard is dropped.
    pub fn begin_load(&self) -> LoadGuard {
        self.loading.set(true);
        LoadGuard {
            loading: Rc::clone(&self.loading),
        }
    }

    /// Drop the oldest retained snapshot from the window.
    ///
    /// The evicted index is queued for deletion from the object store. Fails
    /// when the oldest snapshot is the one currently shown, which during a
    /// save is the one shown before it.
    pub fn evict_oldest(&mut self) -> Result<RecordKey, HistoryError> {
        let active = self.saving_from.unwrap_or(self.index.cur);
        if self.index.min >= active {
            return Err(HistoryError::Unrecoverable { active });
        }
        let evicted = self.index.min;
        self.index.min += 1;
        self.pending_evictions.push(evicted);
        log::warn!("Evicted history snapshot {}", evicted);
        Ok(evicted)
    }

    /// Take the evicted indices still waiting for deletion.
    pub fn take_pending_evictions(&mut self) -> Vec<RecordKey> {
        std::mem::take(&mut self.pending_evictions)
    }

    /// Return to the initial window, dropping queued evictions.
    pub fn reset(&mut self) {
        self.index = HistoryIndex::initial();
        self.saving_from = None;
        self.pending_evictions.clear();
    }
}

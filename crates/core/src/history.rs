//! Linear undo/redo history.
//!
//! A single vector of snapshots plus a pointer. Recording a new snapshot
//! after an undo discards every entry beyond the pointer, so the redo
//! branch is lost.

use crate::settings::Settings;
use crate::types::Timestamp;

/// History of edit settings, as used by the editor session.
pub type SettingsHistory = History<Settings>;

/// One immutable snapshot in a [`History`].
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry<T> {
    pub value: T,
    pub recorded_at: Timestamp,
}

/// Undo/redo store over snapshots of `T`.
///
/// Invariant: `entries` is never empty and `index < entries.len()`.
#[derive(Debug, Clone)]
pub struct History<T> {
    entries: Vec<HistoryEntry<T>>,
    index: usize,
}

impl<T: Clone> History<T> {
    /// Start a history whose only entry is `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            entries: vec![HistoryEntry {
                value: initial,
                recorded_at: chrono::Utc::now(),
            }],
            index: 0,
        }
    }

    /// The snapshot at the pointer.
    pub fn current(&self) -> &T {
        &self.entries[self.index].value
    }

    /// Record `value` as the newest entry.
    ///
    /// Entries after the pointer are dropped. Identical values are still
    /// recorded as separate entries.
    pub fn set(&mut self, value: T) {
        self.entries.truncate(self.index + 1);
        self.entries.push(HistoryEntry {
            value,
            recorded_at: chrono::Utc::now(),
        });
        self.index = self.entries.len() - 1;
    }

    /// Step back one entry. Returns `None` when already at the start.
    pub fn undo(&mut self) -> Option<&T> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        Some(self.current())
    }

    /// Step forward one entry. Returns `None` when already at the end.
    pub fn redo(&mut self) -> Option<&T> {
        if self.index + 1 >= self.entries.len() {
            return None;
        }
        self.index += 1;
        Some(self.current())
    }

    /// Move the pointer to `index`. Out-of-range indices are ignored and
    /// return `None`.
    pub fn jump_to(&mut self, index: usize) -> Option<&T> {
        if index >= self.entries.len() {
            return None;
        }
        self.index = index;
        Some(self.current())
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    /// Position of the pointer in [`entries`](Self::entries).
    pub fn index(&self) -> usize {
        self.index
    }

    /// Full log, oldest first, for a timeline view.
    pub fn entries(&self) -> &[HistoryEntry<T>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false`; a history holds at least its initial entry.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SettingsHistory {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

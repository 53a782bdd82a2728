// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Time-ordered history of device states.

use crate::time::Timestamp;

/// Default retention window for superseded states.
pub const DEFAULT_RETENTION_MS: i64 = 60_000;
/// A purge runs once every this many writes.
const CLEANUP_EVERY: u32 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct StateHistoryEntry<S> {
    pub time: Timestamp,
    pub state: S,
}

#[derive(Debug, Clone)]
pub struct StateStore<S> {
    entries: Vec<StateHistoryEntry<S>>,
    retention_ms: i64,
    writes: u32,
}

impl<S> Default for StateStore<S> {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_MS)
    }
}

impl<S> StateStore<S> {
    pub fn new(retention_ms: i64) -> Self {
        Self {
            entries: Vec::new(),
            retention_ms,
            writes: 0,
        }
    }

    /// Latest entry with `entry.time <= time`.
    pub fn entry_before(&self, time: Timestamp) -> Option<&StateHistoryEntry<S>> {
        // Entries are time-ordered, so the last match is the latest.
        self.entries.iter().rev().find(|e| e.time <= time)
    }

    /// Store `state` as active from `time`.
    ///
    /// Anything stored at or after `time` is superseded and dropped. Every
    /// few writes, entries older than `now` minus the retention window are
    /// purged as well.
    pub fn set_state(&mut self, state: S, time: Timestamp, now: Timestamp) {
        self.entries.retain(|e| e.time < time);
        self.entries.push(StateHistoryEntry { time, state });

        self.writes = self.writes.wrapping_add(1);
        if self.writes % CLEANUP_EVERY == 0 {
            self.clean_up(now - self.retention_ms);
        }
    }

    /// Drop entries strictly after `time`.
    pub fn clear_after(&mut self, time: Timestamp) {
        self.entries.retain(|e| e.time <= time);
    }

    /// Drop entries at or after `time`.
    pub fn clear_from(&mut self, time: Timestamp) {
        self.entries.retain(|e| e.time < time);
    }

    /// Drop entries older than `before`, keeping the latest one of them since
    /// it is still the active state at `before`.
    pub fn clean_up(&mut self, before: Timestamp) {
        let older = self.entries.iter().filter(|e| e.time < before).count();
        if older > 1 {
            self.entries.drain(..older - 1);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Clone + Default> StateStore<S> {
    /// State active at `time`, or the empty state at time 0.
    pub fn state_before(&self, time: Timestamp) -> StateHistoryEntry<S> {
        self.entry_before(time)
            .cloned()
            .unwrap_or_else(|| StateHistoryEntry {
                time: 0,
                state: S::default(),
            })
    }
}

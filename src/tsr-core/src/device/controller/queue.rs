// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Time-scheduled command queue.
//!
//! Entries are kept in insertion order; draining sorts by `(time, seq)` so
//! that commands due at the same instant run in the order they were queued.

use serde::Serialize;

use crate::time::Timestamp;

/// Default drain tick interval in milliseconds.
pub const DEFAULT_TICK_MS: u64 = 20;
/// Default look-ahead applied when deciding whether an entry is due.
pub const DEFAULT_DUE_EPSILON_MS: i64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueEntry<C> {
    pub id: u64,
    pub time: Timestamp,
    /// Grouping key, usually the layer id.
    pub group: Option<String>,
    pub payload: C,
}

#[derive(Debug, Clone)]
pub struct CommandQueue<C> {
    entries: Vec<QueueEntry<C>>,
    next_id: u64,
    due_epsilon: i64,
}

impl<C> Default for CommandQueue<C> {
    fn default() -> Self {
        Self::new(DEFAULT_DUE_EPSILON_MS)
    }
}

impl<C> CommandQueue<C> {
    pub fn new(due_epsilon: i64) -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
            due_epsilon: due_epsilon.max(0),
        }
    }

    /// Schedule `payload` for execution at `time`. Returns the entry id.
    pub fn enqueue(&mut self, time: Timestamp, group: Option<String>, payload: C) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(QueueEntry {
            id,
            time,
            group,
            payload,
        });
        id
    }

    /// Remove every pending entry scheduled at or after `time`.
    /// Returns how many entries were dropped.
    pub fn cancel_from(&mut self, time: Timestamp) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.time < time);
        before - self.entries.len()
    }

    /// Remove every pending entry scheduled strictly after `time`.
    pub fn cancel_after(&mut self, time: Timestamp) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.time <= time);
        before - self.entries.len()
    }

    /// Remove pending entries of one group scheduled at or after `time`.
    pub fn cancel_group_from(&mut self, group: &str, time: Timestamp) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|e| !(e.time >= time && e.group.as_deref() == Some(group)));
        before - self.entries.len()
    }

    /// Pop every entry due at `now` (within the epsilon), in execution order.
    pub fn take_due(&mut self, now: Timestamp) -> Vec<QueueEntry<C>> {
        let horizon = now + self.due_epsilon;
        if !self.entries.iter().any(|e| e.time <= horizon) {
            return Vec::new();
        }
        let (mut due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|e| e.time <= horizon);
        self.entries = pending;
        due.sort_by_key(|e| (e.time, e.id));
        due
    }

    /// Earliest scheduled time, if anything is pending.
    pub fn next_time(&self) -> Option<Timestamp> {
        self.entries.iter().map(|e| e.time).min()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<C: Clone> CommandQueue<C> {
    /// Pending entries in execution order.
    pub fn snapshot(&self) -> Vec<QueueEntry<C>> {
        let mut entries = self.entries.clone();
        entries.sort_by_key(|e| (e.time, e.id));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_from_keeps_earlier_entries() {
        let mut queue = CommandQueue::new(0);
        queue.enqueue(100, None, "a");
        queue.enqueue(200, None, "b");

        assert_eq!(queue.cancel_from(150), 1);

        let left = queue.snapshot();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].time, 100);
        assert_eq!(left[0].payload, "a");
    }

    #[test]
    fn test_cancel_from_is_inclusive_and_cancel_after_is_not() {
        let mut queue = CommandQueue::new(0);
        queue.enqueue(100, None, 1);
        queue.enqueue(200, None, 2);

        let mut other = queue.clone();

        queue.cancel_from(200);
        assert_eq!(queue.len(), 1);

        other.cancel_after(200);
        assert_eq!(other.len(), 2);
    }

    #[test]
    fn test_take_due_orders_by_time_then_insertion() {
        let mut queue = CommandQueue::new(0);
        queue.enqueue(300, None, "late");
        queue.enqueue(100, None, "first");
        queue.enqueue(100, None, "second");
        queue.enqueue(50, None, "earliest");

        let due: Vec<_> = queue.take_due(100).into_iter().map(|e| e.payload).collect();
        assert_eq!(due, vec!["earliest", "first", "second"]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.next_time(), Some(300));
    }

    #[test]
    fn test_take_due_honours_epsilon() {
        let mut queue = CommandQueue::new(10);
        queue.enqueue(1_005, None, ());
        queue.enqueue(1_011, None, ());

        assert_eq!(queue.take_due(1_000).len(), 1);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_cancel_group_from() {
        let mut queue = CommandQueue::new(0);
        queue.enqueue(100, Some("gfx".into()), 1);
        queue.enqueue(200, Some("gfx".into()), 2);
        queue.enqueue(200, Some("cam".into()), 3);

        assert_eq!(queue.cancel_group_from("gfx", 150), 1);
        let payloads: Vec<_> = queue.snapshot().into_iter().map(|e| e.payload).collect();
        assert_eq!(payloads, vec![1, 3]);
    }
}

// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};

use thiserror::Error;

use roundmint_vm_core::Timestamp;

use crate::event::Event;

/// Handle to a scheduled timeout.
///
/// Monotonically increasing, which makes it double as the tie-breaker for
/// entries sharing a deadline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(u64);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeoutError {
    #[error("unknown timeout entry {0:?}")]
    NotFound(EntryId),
}

/// A scheduled timeout. Orders by deadline first, entry id second.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeoutEvent {
    pub deadline: Timestamp,
    pub entry_id: EntryId,
    pub event: Event,
}

/// Min-priority queue of timeouts with lazy cancellation.
///
/// Cancelled entries stay in the heap and are discarded when they surface.
/// Deadlines are block-time instants; the queue never looks at a clock.
#[derive(Debug, Default)]
pub struct Timeouts {
    heap: BinaryHeap<Reverse<TimeoutEvent>>,
    live: BTreeSet<EntryId>,
    cancelled: BTreeSet<EntryId>,
    next_id: u64,
}

impl Timeouts {
    pub fn new() -> Self {
        Default::default()
    }

    /// Schedule `event` to fire once block time passes `deadline`.
    pub fn add_timeout(&mut self, deadline: Timestamp, event: Event) -> EntryId {
        let entry_id = EntryId(self.next_id);
        self.next_id += 1;
        self.heap.push(Reverse(TimeoutEvent {
            deadline,
            entry_id,
            event,
        }));
        self.live.insert(entry_id);
        entry_id
    }

    /// Mark the entry as cancelled; it is dropped when it reaches the front.
    pub fn cancel_timeout(&mut self, entry_id: EntryId) -> Result<(), TimeoutError> {
        if !self.live.remove(&entry_id) {
            return Err(TimeoutError::NotFound(entry_id));
        }
        self.cancelled.insert(entry_id);
        Ok(())
    }

    /// Drop every cancelled entry sitting at the front of the heap.
    pub fn pop_earliest_cancelled_timeouts(&mut self) {
        while let Some(Reverse(entry)) = self.heap.peek() {
            if self.cancelled.remove(&entry.entry_id) {
                self.heap.pop();
            } else {
                break;
            }
        }
    }

    /// The earliest pending timeout, without popping it.
    pub fn get_earliest_timeout(&mut self) -> Option<(Timestamp, Event)> {
        self.pop_earliest_cancelled_timeouts();
        self.heap.peek().map(|Reverse(e)| (e.deadline, e.event))
    }

    /// Pop the earliest pending timeout.
    pub fn pop_timeout(&mut self) -> Option<TimeoutEvent> {
        self.pop_earliest_cancelled_timeouts();
        let Reverse(entry) = self.heap.pop()?;
        self.live.remove(&entry.entry_id);
        Some(entry)
    }

    /// Number of pending (not cancelled) timeouts.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

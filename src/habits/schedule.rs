use std::collections::VecDeque;

use tokio::time::Instant;

use super::entities::HabitId;

/// A removal of a completed habit that becomes due at `due`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRemoval {
    pub id: HabitId,
    pub due: Instant,
}

/// Deferred removals ordered by due time. At most one entry per habit.
#[derive(Debug, Default)]
pub struct RemovalQueue {
    pending: VecDeque<PendingRemoval>,
}

impl RemovalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the habit already has a pending removal. The existing entry keeps its
    /// due time.
    pub fn schedule(&mut self, id: HabitId, due: Instant) -> bool {
        if self.contains(id) {
            return false;
        }
        let position = self.pending.partition_point(|v| v.due <= due);
        self.pending.insert(position, PendingRemoval { id, due });
        true
    }

    pub fn cancel(&mut self, id: HabitId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|v| v.id != id);
        before != self.pending.len()
    }

    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.pending.len();
        self.pending.clear();
        cancelled
    }

    pub fn contains(&self, id: HabitId) -> bool {
        self.pending.iter().any(|v| v.id == id)
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.pending.front().map(|v| v.due)
    }

    /// Pops every removal due at or before `now`, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<HabitId> {
        let count = self.pending.partition_point(|v| v.due <= now);
        self.pending.drain(..count).map(|v| v.id).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

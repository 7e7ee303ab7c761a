use std::{num::NonZeroU32, time::Duration};

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::{
    storage::{
        persistence::{load_slot, save_slot, HABITS_SLOT},
        slot_storage::SlotStorage,
    },
    utils::color::HexColor,
};

use super::{
    entities::{Habit, HabitId, HabitRef},
    schedule::RemovalQueue,
};

/// How long a completed habit stays in the list before it's removed.
pub const COMPLETION_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created(HabitId),
    /// A habit with the same name existed and only its goal was changed.
    Updated(HabitId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementOutcome {
    Progressed { progress: u32, goal: u32 },
    /// Goal was reached with this increment. The habit is removed after [COMPLETION_GRACE].
    Completed,
    AlreadyAtGoal,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResetSummary {
    /// Habits that were in the list.
    pub reset: usize,
    /// Habits that came back after being removed for completion.
    pub restored: usize,
}

/// Owner of the ordered habit list.
///
/// Every mutating operation ends by re-deriving `is_completed` from progress for the whole list
/// and then saving the list into [HABITS_SLOT]. Save failures are logged and swallowed, the
/// in-memory list stays authoritative.
pub struct HabitStore<S: SlotStorage> {
    habits: Vec<Habit>,
    /// Habits removed after completion, in completion order. Not persisted.
    recently_completed: Vec<Habit>,
    removals: RemovalQueue,
    storage: S,
}

impl<S: SlotStorage> HabitStore<S> {
    /// Loads the habit list. A missing or unreadable slot results in an empty list.
    pub fn load(storage: S) -> Self {
        let mut habits = match load_slot::<Vec<Habit>>(&storage, HABITS_SLOT) {
            Ok(Some(habits)) => {
                info!("Loaded {} habits", habits.len());
                habits
            }
            Ok(None) => {
                info!("No saved habits found");
                vec![]
            }
            Err(e) => {
                error!("Failed to load habits, starting with an empty list: {e}");
                vec![]
            }
        };

        // Removals that were pending when the previous process stopped are not resumed. Such
        // habits stay in the list as completed until the next reset.
        for habit in habits.iter_mut() {
            if habit.sync_completion() {
                warn!("Fixed completion flag of {:?}", habit.name);
            }
        }

        Self {
            habits,
            recently_completed: vec![],
            removals: RemovalQueue::new(),
            storage,
        }
    }

    pub fn habits(&self) -> &[Habit] {
        &self.habits
    }

    pub fn recently_completed(&self) -> &[Habit] {
        &self.recently_completed
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn find(&self, target: &HabitRef) -> Option<&Habit> {
        self.habits.iter().find(|v| target.matches(v))
    }

    pub fn is_removal_pending(&self, id: HabitId) -> bool {
        self.removals.contains(id)
    }

    pub fn pending_removals(&self) -> usize {
        self.removals.len()
    }

    pub fn next_removal_due(&self) -> Option<Instant> {
        self.removals.next_due()
    }

    /// Creates a habit, or changes the goal of the habit that already has this name.
    pub fn upsert(
        &mut self,
        name: &str,
        goal: NonZeroU32,
        color: HexColor,
        now: Instant,
    ) -> UpsertOutcome {
        let outcome = match self.habits.iter_mut().find(|v| v.name == name) {
            Some(existing) => {
                debug!(
                    "Changing goal of {name:?} from {} to {goal}",
                    existing.goal_today
                );
                existing.goal_today = goal;
                UpsertOutcome::Updated(existing.id)
            }
            None => {
                let habit = Habit::new(name, goal, color);
                info!("Created habit {name:?} with goal {goal}");
                let id = habit.id;
                self.habits.push(habit);
                UpsertOutcome::Created(id)
            }
        };
        self.settle(now);
        self.persist();
        outcome
    }

    /// Adds one unit of progress. Reaching the goal schedules the habit's removal.
    pub fn increment(&mut self, id: HabitId, now: Instant) -> IncrementOutcome {
        let outcome = match self.habits.iter_mut().find(|v| v.id == id) {
            None => IncrementOutcome::NotFound,
            Some(habit) if habit.goal_reached() => IncrementOutcome::AlreadyAtGoal,
            Some(habit) => {
                habit.progress_today += 1;
                if habit.goal_reached() {
                    info!("Completed {:?}", habit.name);
                    IncrementOutcome::Completed
                } else {
                    IncrementOutcome::Progressed {
                        progress: habit.progress_today,
                        goal: habit.goal_today.get(),
                    }
                }
            }
        };
        self.settle(now);
        self.persist();
        outcome
    }

    /// Moves every completed habit whose grace interval elapsed out of the list and into the
    /// recently completed set. Returns ids of the removed habits.
    pub fn run_due_removals(&mut self, now: Instant) -> Vec<HabitId> {
        let mut removed = vec![];
        for id in self.removals.take_due(now) {
            let Some(position) = self.position(id) else {
                debug!("Habit {id} is already gone, nothing to remove");
                continue;
            };
            if !self.habits[position].is_completed {
                debug!("Habit {id} is no longer completed, keeping it");
                continue;
            }
            let habit = self.habits.remove(position);
            info!("Removed completed habit {:?}", habit.name);
            self.recently_completed.retain(|v| v.id != id);
            self.recently_completed.push(habit);
            removed.push(id);
        }
        if !removed.is_empty() {
            self.persist();
        }
        removed
    }

    /// Flips the hidden flag. Returns the new value, or `None` if the habit doesn't exist.
    pub fn toggle_hidden(&mut self, id: HabitId) -> Option<bool> {
        let habit = self.habits.iter_mut().find(|v| v.id == id)?;
        habit.is_hidden = !habit.is_hidden;
        let hidden = habit.is_hidden;
        self.persist();
        Some(hidden)
    }

    /// Removes the habit for good, together with its pending removal.
    pub fn delete(&mut self, id: HabitId) -> Option<Habit> {
        let position = self.position(id)?;
        let habit = self.habits.remove(position);
        if self.removals.cancel(id) {
            debug!("Cancelled pending removal of {:?}", habit.name);
        }
        info!("Deleted habit {:?}", habit.name);
        self.persist();
        Some(habit)
    }

    /// Starts a new day: zeroes progress everywhere and appends habits removed for completion
    /// back to the end of the list. Hidden flags are kept.
    pub fn reset_day(&mut self) -> ResetSummary {
        let cancelled = self.removals.cancel_all();
        if cancelled > 0 {
            debug!("Cancelled {cancelled} pending removals");
        }

        for habit in self.habits.iter_mut() {
            habit.reset_progress();
        }
        let reset = self.habits.len();

        let restored = self.recently_completed.len();
        for mut habit in self.recently_completed.drain(..) {
            habit.reset_progress();
            self.habits.push(habit);
        }

        info!("Day reset: {reset} habits reset, {restored} restored");
        self.persist();
        ResetSummary { reset, restored }
    }

    fn position(&self, id: HabitId) -> Option<usize> {
        self.habits.iter().position(|v| v.id == id)
    }

    /// Re-derives completion flags. A habit that just became completed gets a removal scheduled,
    /// one that stopped being completed loses its pending removal.
    fn settle(&mut self, now: Instant) {
        for habit in self.habits.iter_mut() {
            let changed = habit.sync_completion();
            if habit.is_completed {
                if changed {
                    self.removals.schedule(habit.id, now + COMPLETION_GRACE);
                }
            } else if self.removals.cancel(habit.id) {
                debug!("{:?} is no longer completed", habit.name);
            }
        }
    }

    fn persist(&self) {
        if let Err(e) = save_slot(&self.storage, HABITS_SLOT, &self.habits) {
            error!("Failed to save habits: {e}");
        }
    }
}

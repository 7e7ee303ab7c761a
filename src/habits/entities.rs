use std::{fmt::Display, num::NonZeroU32, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::color::HexColor;

/// Stable identity of a habit. Survives saving and loading, never reused.
pub type HabitId = Uuid;

/// A recurring daily task. This is also the on-disk shape: the persisted slot is a JSON array of
/// these, so field names follow the camelCase naming of the stored format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: HabitId,
    pub name: String,
    pub progress_today: u32,
    pub goal_today: NonZeroU32,
    pub color: HexColor,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub is_hidden: bool,
}

impl Habit {
    pub fn new(name: impl Into<String>, goal: NonZeroU32, color: HexColor) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            progress_today: 0,
            goal_today: goal,
            color,
            is_completed: false,
            is_hidden: false,
        }
    }

    pub fn goal_reached(&self) -> bool {
        self.progress_today >= self.goal_today.get()
    }

    /// Brings `is_completed` in line with progress. Returns true if the flag changed.
    pub fn sync_completion(&mut self) -> bool {
        let reached = self.goal_reached();
        let changed = self.is_completed != reached;
        self.is_completed = reached;
        changed
    }

    /// Zeroes today's progress. The hidden flag is kept.
    pub fn reset_progress(&mut self) {
        self.progress_today = 0;
        self.sync_completion();
    }
}

/// The way front-ends point at a habit: by id when they have one, by name otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HabitRef {
    Id(HabitId),
    Name(String),
}

impl HabitRef {
    pub fn matches(&self, habit: &Habit) -> bool {
        match self {
            HabitRef::Id(id) => habit.id == *id,
            HabitRef::Name(name) => habit.name == *name,
        }
    }
}

impl FromStr for HabitRef {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match Uuid::parse_str(s) {
            Ok(id) => HabitRef::Id(id),
            Err(_) => HabitRef::Name(s.to_string()),
        })
    }
}

impl From<HabitId> for HabitRef {
    fn from(value: HabitId) -> Self {
        HabitRef::Id(value)
    }
}

impl Display for HabitRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HabitRef::Id(id) => write!(f, "{id}"),
            HabitRef::Name(name) => write!(f, "\"{name}\""),
        }
    }
}

use std::num::NonZeroU32;

use anyhow::{anyhow, Result};
use tokio::sync::{mpsc, oneshot};

use crate::{
    habits::{
        entities::{Habit, HabitRef},
        store::{IncrementOutcome, ResetSummary, UpsertOutcome},
    },
    utils::color::HexColor,
};

/// Operations front-ends can ask the tracker to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HabitCommand {
    Upsert {
        name: String,
        goal: NonZeroU32,
        color: HexColor,
    },
    Increment(HabitRef),
    ToggleHidden(HabitRef),
    Delete(HabitRef),
    ResetDay,
    Snapshot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HabitReply {
    Upserted {
        habit: Habit,
        outcome: UpsertOutcome,
    },
    /// `habit` is the state right after the increment.
    Incremented {
        habit: Habit,
        outcome: IncrementOutcome,
    },
    HiddenToggled(Habit),
    Deleted(Habit),
    Reset(ResetSummary),
    Snapshot {
        habits: Vec<Habit>,
        recently_completed: Vec<Habit>,
    },
    NotFound(HabitRef),
}

#[derive(Debug)]
pub struct HabitRequest {
    pub command: HabitCommand,
    pub reply: oneshot::Sender<HabitReply>,
}

/// Cloneable sending side of the tracker. The tracker stops once every handle is dropped.
#[derive(Clone)]
pub struct TrackerHandle {
    sender: mpsc::Sender<HabitRequest>,
}

impl TrackerHandle {
    pub fn new(sender: mpsc::Sender<HabitRequest>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, command: HabitCommand) -> Result<HabitReply> {
        let (reply, receiver) = oneshot::channel();
        self.sender
            .send(HabitRequest { command, reply })
            .await
            .map_err(|_| anyhow!("Habit tracker is not running"))?;
        receiver
            .await
            .map_err(|_| anyhow!("Habit tracker stopped before replying"))
    }
}

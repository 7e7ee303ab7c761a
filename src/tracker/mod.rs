//! The tracker is the single owner of the [HabitStore]. Front-ends talk to it through a
//! [request::TrackerHandle]; the tracker applies their commands one at a time, removes completed
//! habits when their grace interval passes and starts a new day at local midnight.

use std::{future::Future, path::Path};

use anyhow::Result;
use chrono::NaiveDate;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    habits::{entities::HabitRef, store::HabitStore},
    storage::{
        persistence::{load_slot, save_slot, LAST_RESET_SLOT},
        slot_storage::{FileSlotStorage, SlotStorage},
    },
    utils::{
        clock::{Clock, DefaultClock},
        time::time_until_day_end,
    },
};

use request::{HabitCommand, HabitReply, HabitRequest, TrackerHandle};

pub mod request;
pub mod shutdown;

const REQUEST_BUFFER: usize = 16;

pub struct HabitTracker<S: SlotStorage> {
    store: HabitStore<S>,
    receiver: mpsc::Receiver<HabitRequest>,
    clock: Box<dyn Clock>,
    shutdown: CancellationToken,
    /// Whether to reset the day when local midnight passes while running.
    day_rollover: bool,
    last_reset: Option<NaiveDate>,
}

/// Loads the store from `storage` and wires a tracker to a handle.
pub fn create_tracker<S: SlotStorage>(
    storage: S,
    clock: impl Clock,
    shutdown: &CancellationToken,
    day_rollover: bool,
) -> (HabitTracker<S>, TrackerHandle) {
    let (sender, receiver) = mpsc::channel(REQUEST_BUFFER);
    let tracker = HabitTracker {
        store: HabitStore::load(storage),
        receiver,
        clock: Box::new(clock),
        shutdown: shutdown.clone(),
        day_rollover,
        last_reset: None,
    };
    (tracker, TrackerHandle::new(sender))
}

/// Runs a tracker over the slots in `app_dir` for as long as `front_end` runs. Ctrl-C cancels the
/// token handed to the front-end and stops the tracker.
pub async fn with_tracker<F, Fut, T>(app_dir: &Path, day_rollover: bool, front_end: F) -> Result<T>
where
    F: FnOnce(TrackerHandle, CancellationToken) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let storage = FileSlotStorage::new(app_dir.join("slots"))?;
    let shutdown_token = CancellationToken::new();
    let (tracker, handle) = create_tracker(storage, DefaultClock, &shutdown_token, day_rollover);

    let (_, tracker_result, front_end_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        tracker.run(),
        async {
            let result = front_end(handle, shutdown_token.clone()).await;
            shutdown_token.cancel();
            result
        },
    );

    if let Err(e) = &tracker_result {
        error!("Habit tracker got an error {e:?}");
    }
    tracker_result?;
    front_end_result
}

impl<S: SlotStorage> HabitTracker<S> {
    /// Executes the tracker event loop until shutdown or until every handle is dropped.
    pub async fn run(mut self) -> Result<()> {
        self.catch_up_reset();
        let mut day_end = self.next_day_end();

        loop {
            let removal_due = self.store.next_removal_due();
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    break
                }
                request = self.receiver.recv() => {
                    match request {
                        Some(request) => self.handle(request),
                        None => break,
                    }
                }
                _ = self.clock.sleep_until(removal_due.unwrap_or(day_end)), if removal_due.is_some() => {
                    let removed = self.store.run_due_removals(self.clock.instant());
                    debug!("Removed {} completed habits", removed.len());
                }
                _ = self.clock.sleep_until(day_end), if self.day_rollover => {
                    self.roll_over();
                    day_end = self.next_day_end();
                }
            }
        }

        self.finalize();
        Ok(())
    }

    fn handle(&mut self, HabitRequest { command, reply }: HabitRequest) {
        debug!("Handling {command:?}");
        let response = self.apply(command);
        if reply.send(response).is_err() {
            warn!("Requester went away before receiving a reply");
        }
    }

    fn apply(&mut self, command: HabitCommand) -> HabitReply {
        let now = self.clock.instant();
        match command {
            HabitCommand::Upsert { name, goal, color } => {
                let outcome = self.store.upsert(&name, goal, color, now);
                match self.store.find(&HabitRef::Name(name.clone())) {
                    Some(habit) => HabitReply::Upserted {
                        habit: habit.clone(),
                        outcome,
                    },
                    None => HabitReply::NotFound(HabitRef::Name(name)),
                }
            }
            HabitCommand::Increment(target) => {
                let Some(id) = self.store.find(&target).map(|v| v.id) else {
                    return HabitReply::NotFound(target);
                };
                let outcome = self.store.increment(id, now);
                match self.store.find(&id.into()) {
                    Some(habit) => HabitReply::Incremented {
                        habit: habit.clone(),
                        outcome,
                    },
                    None => HabitReply::NotFound(target),
                }
            }
            HabitCommand::ToggleHidden(target) => {
                let Some(id) = self.store.find(&target).map(|v| v.id) else {
                    return HabitReply::NotFound(target);
                };
                self.store.toggle_hidden(id);
                match self.store.find(&id.into()) {
                    Some(habit) => HabitReply::HiddenToggled(habit.clone()),
                    None => HabitReply::NotFound(target),
                }
            }
            HabitCommand::Delete(target) => {
                let deleted = self
                    .store
                    .find(&target)
                    .map(|v| v.id)
                    .and_then(|id| self.store.delete(id));
                match deleted {
                    Some(habit) => HabitReply::Deleted(habit),
                    None => HabitReply::NotFound(target),
                }
            }
            HabitCommand::ResetDay => {
                let summary = self.store.reset_day();
                self.record_reset(self.clock.local_time().date_naive());
                HabitReply::Reset(summary)
            }
            HabitCommand::Snapshot => HabitReply::Snapshot {
                habits: self.store.habits().to_vec(),
                recently_completed: self.store.recently_completed().to_vec(),
            },
        }
    }

    /// Resets the day if the previous run happened on an earlier date.
    fn catch_up_reset(&mut self) {
        let today = self.clock.local_time().date_naive();
        match load_slot::<NaiveDate>(self.store.storage(), LAST_RESET_SLOT) {
            Ok(Some(last)) if last < today => {
                info!("Last reset happened on {last}, starting a new day");
                self.store.reset_day();
                self.record_reset(today);
            }
            Ok(Some(last)) => self.last_reset = Some(last),
            Ok(None) => self.record_reset(today),
            Err(e) => {
                warn!("Couldn't read the last reset date, assuming today: {e}");
                self.record_reset(today);
            }
        }
    }

    fn roll_over(&mut self) {
        let today = self.clock.local_time().date_naive();
        if self.last_reset.is_some_and(|last| last >= today) {
            debug!("Woke up before midnight, day {today} is already reset");
            return;
        }
        info!("Midnight passed, starting {today}");
        self.store.reset_day();
        self.record_reset(today);
    }

    fn record_reset(&mut self, day: NaiveDate) {
        self.last_reset = Some(day);
        if let Err(e) = save_slot(self.store.storage(), LAST_RESET_SLOT, &day) {
            error!("Failed to save the last reset date: {e}");
        }
    }

    fn next_day_end(&self) -> tokio::time::Instant {
        let left = time_until_day_end(self.clock.local_time());
        self.clock.instant() + left.to_std().unwrap_or_default()
    }

    fn finalize(&mut self) {
        self.receiver.close();
        let pending = self.store.pending_removals();
        if pending > 0 {
            info!("Stopping with {pending} completed habits still in the list");
        }
    }
}

#[cfg(test)]
mod tracker_tests {
    use std::{num::NonZeroU32, sync::Arc, time::Duration};

    use anyhow::{bail, Result};
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
    use tokio_util::sync::CancellationToken;

    use crate::{
        habits::{
            entities::{Habit, HabitRef},
            store::{IncrementOutcome, ResetSummary, COMPLETION_GRACE},
        },
        storage::{
            persistence::{load_slot, save_slot, HABITS_SLOT, LAST_RESET_SLOT},
            slot_storage::MemorySlotStorage,
        },
        tracker::{
            create_tracker,
            request::{HabitCommand, HabitReply, TrackerHandle},
        },
        utils::{
            clock::TestClock,
            color::PALETTE,
            logging::TEST_LOGGING,
        },
    };

    fn test_day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2018, 7, 4).unwrap()
    }

    fn at(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDateTime::new(
            test_day(),
            NaiveTime::from_hms_opt(hour, minute, second).unwrap(),
        )
    }

    fn read_habit() -> HabitCommand {
        HabitCommand::Upsert {
            name: "Read".into(),
            goal: NonZeroU32::new(3).unwrap(),
            color: PALETTE[0],
        }
    }

    fn tick(name: &str) -> HabitCommand {
        HabitCommand::Increment(HabitRef::Name(name.into()))
    }

    async fn snapshot(handle: &TrackerHandle) -> Result<(Vec<Habit>, Vec<Habit>)> {
        match handle.send(HabitCommand::Snapshot).await? {
            HabitReply::Snapshot {
                habits,
                recently_completed,
            } => Ok((habits, recently_completed)),
            other => bail!("Unexpected reply {other:?}"),
        }
    }

    fn storage_with_last_reset(day: NaiveDate) -> Arc<MemorySlotStorage> {
        let storage = Arc::new(MemorySlotStorage::new());
        save_slot(&storage, LAST_RESET_SLOT, &day).unwrap();
        storage
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_removal_and_reset() -> Result<()> {
        *TEST_LOGGING;
        let storage = storage_with_last_reset(test_day());
        let shutdown = CancellationToken::new();
        let (tracker, handle) = create_tracker(
            storage.clone(),
            TestClock::starting_at_local(at(12, 0, 0)),
            &shutdown,
            false,
        );

        let (tracker_result, test_result) = tokio::join!(tracker.run(), async move {
            handle.send(read_habit()).await?;
            handle.send(tick("Read")).await?;
            handle.send(tick("Read")).await?;
            let HabitReply::Incremented { habit, outcome } = handle.send(tick("Read")).await?
            else {
                bail!("Expected an increment");
            };
            assert_eq!(outcome, IncrementOutcome::Completed);
            assert!(habit.is_completed);

            let (habits, _) = snapshot(&handle).await?;
            assert_eq!(habits.len(), 1);
            assert!(habits[0].is_completed);

            tokio::time::sleep(COMPLETION_GRACE + Duration::from_millis(10)).await;

            let (habits, completed) = snapshot(&handle).await?;
            assert!(habits.is_empty());
            assert_eq!(completed.len(), 1);
            assert!(matches!(
                handle.send(tick("Read")).await?,
                HabitReply::NotFound(_)
            ));

            let reply = handle.send(HabitCommand::ResetDay).await?;
            assert_eq!(
                reply,
                HabitReply::Reset(ResetSummary {
                    reset: 0,
                    restored: 1
                })
            );

            let (habits, completed) = snapshot(&handle).await?;
            assert!(completed.is_empty());
            assert_eq!(habits[0].name, "Read");
            assert_eq!(habits[0].progress_today, 0);
            anyhow::Ok(())
        });

        tracker_result?;
        test_result?;

        let saved: Vec<Habit> = load_slot(&storage, HABITS_SLOT)?.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].progress_today, 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_midnight_rollover() -> Result<()> {
        *TEST_LOGGING;
        let storage = storage_with_last_reset(test_day());
        let shutdown = CancellationToken::new();
        let (tracker, handle) = create_tracker(
            storage.clone(),
            TestClock::starting_at_local(at(23, 59, 58)),
            &shutdown,
            true,
        );

        let (tracker_result, test_result) = tokio::join!(tracker.run(), async move {
            handle
                .send(HabitCommand::Upsert {
                    name: "Walk".into(),
                    goal: NonZeroU32::new(1).unwrap(),
                    color: PALETTE[1],
                })
                .await?;
            handle
                .send(HabitCommand::Upsert {
                    name: "Water".into(),
                    goal: NonZeroU32::new(8).unwrap(),
                    color: PALETTE[2],
                })
                .await?;
            handle.send(tick("Walk")).await?;
            handle.send(tick("Water")).await?;

            tokio::time::sleep(Duration::from_secs(1)).await;
            let (habits, completed) = snapshot(&handle).await?;
            assert_eq!(habits.len(), 1);
            assert_eq!(completed.len(), 1);

            tokio::time::sleep(Duration::from_secs(2)).await;
            let (habits, completed) = snapshot(&handle).await?;
            assert!(completed.is_empty());
            let names = habits.iter().map(|v| v.name.as_str()).collect::<Vec<_>>();
            assert_eq!(names, vec!["Water", "Walk"]);
            assert!(habits.iter().all(|v| v.progress_today == 0));
            anyhow::Ok(())
        });

        tracker_result?;
        test_result?;

        let last_reset: NaiveDate = load_slot(&storage, LAST_RESET_SLOT)?.unwrap();
        assert_eq!(last_reset, test_day().succ_opt().unwrap());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_catch_up_reset_on_start() -> Result<()> {
        *TEST_LOGGING;
        let storage = storage_with_last_reset(test_day().pred_opt().unwrap());
        let mut habit = Habit::new("Stretch", NonZeroU32::new(3).unwrap(), PALETTE[3]);
        habit.progress_today = 2;
        habit.is_hidden = true;
        save_slot(&storage, HABITS_SLOT, &vec![habit])?;

        let shutdown = CancellationToken::new();
        let (tracker, handle) = create_tracker(
            storage.clone(),
            TestClock::starting_at_local(at(8, 30, 0)),
            &shutdown,
            false,
        );

        let (tracker_result, test_result) = tokio::join!(tracker.run(), async move {
            let (habits, _) = snapshot(&handle).await?;
            assert_eq!(habits[0].progress_today, 0);
            assert!(habits[0].is_hidden);
            anyhow::Ok(())
        });

        tracker_result?;
        test_result?;
        let last_reset: NaiveDate = load_slot(&storage, LAST_RESET_SLOT)?.unwrap();
        assert_eq!(last_reset, test_day());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_start_records_day_without_reset() -> Result<()> {
        *TEST_LOGGING;
        let storage = Arc::new(MemorySlotStorage::new());
        let mut habit = Habit::new("Stretch", NonZeroU32::new(3).unwrap(), PALETTE[3]);
        habit.progress_today = 2;
        save_slot(&storage, HABITS_SLOT, &vec![habit])?;

        let shutdown = CancellationToken::new();
        let (tracker, handle) = create_tracker(
            storage.clone(),
            TestClock::starting_at_local(at(8, 30, 0)),
            &shutdown,
            false,
        );

        let (tracker_result, test_result) = tokio::join!(tracker.run(), async move {
            let (habits, _) = snapshot(&handle).await?;
            assert_eq!(habits[0].progress_today, 2);
            anyhow::Ok(())
        });

        tracker_result?;
        test_result?;
        let last_reset: NaiveDate = load_slot(&storage, LAST_RESET_SLOT)?.unwrap();
        assert_eq!(last_reset, test_day());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_during_grace_interval() -> Result<()> {
        *TEST_LOGGING;
        let storage = storage_with_last_reset(test_day());
        let shutdown = CancellationToken::new();
        let (tracker, handle) = create_tracker(
            storage.clone(),
            TestClock::starting_at_local(at(12, 0, 0)),
            &shutdown,
            false,
        );

        let (tracker_result, test_result) = tokio::join!(tracker.run(), async move {
            handle
                .send(HabitCommand::Upsert {
                    name: "Floss".into(),
                    goal: NonZeroU32::new(1).unwrap(),
                    color: PALETTE[4],
                })
                .await?;
            handle.send(tick("Floss")).await?;
            let deleted = handle
                .send(HabitCommand::Delete(HabitRef::Name("Floss".into())))
                .await?;
            assert!(matches!(deleted, HabitReply::Deleted(ref v) if v.name == "Floss"));

            tokio::time::sleep(COMPLETION_GRACE * 2).await;

            let (habits, completed) = snapshot(&handle).await?;
            assert!(habits.is_empty());
            assert!(completed.is_empty());
            assert!(matches!(
                handle
                    .send(HabitCommand::ToggleHidden(HabitRef::Name("Floss".into())))
                    .await?,
                HabitReply::NotFound(_)
            ));
            anyhow::Ok(())
        });

        tracker_result?;
        test_result?;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_abandons_pending_removal() -> Result<()> {
        *TEST_LOGGING;
        let storage = storage_with_last_reset(test_day());
        let shutdown = CancellationToken::new();
        let (tracker, handle) = create_tracker(
            storage.clone(),
            TestClock::starting_at_local(at(12, 0, 0)),
            &shutdown,
            true,
        );

        let (tracker_result, test_result) = tokio::join!(tracker.run(), async {
            handle
                .send(HabitCommand::Upsert {
                    name: "Read".into(),
                    goal: NonZeroU32::new(1).unwrap(),
                    color: PALETTE[0],
                })
                .await?;
            handle.send(tick("Read")).await?;
            shutdown.cancel();
            anyhow::Ok(())
        });

        tracker_result?;
        test_result?;
        assert!(handle.send(HabitCommand::Snapshot).await.is_err());

        let saved: Vec<Habit> = load_slot(&storage, HABITS_SLOT)?.unwrap();
        assert_eq!(saved.len(), 1);
        assert!(saved[0].is_completed);
        Ok(())
    }
}

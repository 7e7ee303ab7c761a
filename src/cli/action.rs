use std::{fmt::Write, num::NonZeroU32, time::Duration};

use anyhow::{anyhow, bail, Result};
use clap::Subcommand;
use tokio_util::sync::CancellationToken;

use crate::{
    habits::{
        entities::HabitRef,
        store::{IncrementOutcome, UpsertOutcome},
    },
    tracker::request::{HabitCommand, HabitReply, TrackerHandle},
    utils::{
        clock::Clock,
        color::{parse_color_choice, HexColor, DEFAULT_COLOR},
        time::{format_countdown, time_until_day_end},
    },
};

use super::output::{render_habit, render_list, render_palette, OutputStyle};

/// Things a user can do with their habits. Shared by the command line and the session prompt.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum HabitAction {
    #[command(about = "Create a habit, or change the daily goal of an existing one with the same name")]
    Add {
        #[arg(value_parser = non_empty_name)]
        name: String,
        #[arg(
            short,
            long,
            default_value_t = 1,
            value_parser = clap::value_parser!(u32).range(1..=10),
            help = "Times per day"
        )]
        goal: u32,
        #[arg(
            short,
            long,
            value_parser = parse_color_choice,
            help = "Color as #RRGGBB or a palette index. See `palette`"
        )]
        color: Option<HexColor>,
    },
    #[command(about = "Add one unit of progress to a habit")]
    Tick {
        #[arg(help = "Habit name or id")]
        habit: HabitRef,
    },
    #[command(about = "Hide a habit, or show it again if it's hidden")]
    Hide {
        #[arg(help = "Habit name or id")]
        habit: HabitRef,
    },
    #[command(about = "Remove a habit for good")]
    Delete {
        #[arg(help = "Habit name or id")]
        habit: HabitRef,
    },
    #[command(about = "Start a new day: zero all progress and bring back completed habits")]
    Reset,
    #[command(about = "Show today's habits")]
    List {
        #[arg(short, long, help = "Include hidden habits")]
        all: bool,
    },
    #[command(about = "Show how much time is left until the day resets")]
    Left {
        #[arg(short, long, help = "Keep updating every second until interrupted")]
        watch: bool,
    },
    #[command(about = "Show colors available by index")]
    Palette,
}

fn non_empty_name(value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err("Habit name can't be empty".into())
    } else {
        Ok(trimmed.to_string())
    }
}

/// Performs an action through the tracker and renders what happened. Errors are user facing, for
/// example a habit that doesn't exist.
pub async fn perform(
    action: HabitAction,
    tracker: &TrackerHandle,
    clock: &dyn Clock,
    style: OutputStyle,
) -> Result<String> {
    let command = match action {
        HabitAction::Add { name, goal, color } => HabitCommand::Upsert {
            name,
            goal: NonZeroU32::new(goal).ok_or_else(|| anyhow!("Goal has to be at least 1"))?,
            color: color.unwrap_or(DEFAULT_COLOR),
        },
        HabitAction::Tick { habit } => HabitCommand::Increment(habit),
        HabitAction::Hide { habit } => HabitCommand::ToggleHidden(habit),
        HabitAction::Delete { habit } => HabitCommand::Delete(habit),
        HabitAction::Reset => HabitCommand::ResetDay,
        HabitAction::List { all } => {
            let HabitReply::Snapshot { habits, .. } = tracker.send(HabitCommand::Snapshot).await?
            else {
                bail!("Tracker sent an unexpected reply to a snapshot request");
            };
            return Ok(render_list(&habits, all, style));
        }
        HabitAction::Left { .. } => return Ok(render_time_left(clock)),
        HabitAction::Palette => return Ok(render_palette(style)),
    };

    let reply = tracker.send(command).await?;
    render_reply(reply, style)
}

fn render_reply(reply: HabitReply, style: OutputStyle) -> Result<String> {
    let mut out = String::new();
    match reply {
        HabitReply::Upserted {
            habit,
            outcome: UpsertOutcome::Created(_),
        } => write!(out, "Added {}", render_habit(&habit, style))?,
        HabitReply::Upserted {
            habit,
            outcome: UpsertOutcome::Updated(_),
        } => write!(
            out,
            "Changed goal of {:?} to {} per day",
            habit.name, habit.goal_today
        )?,
        HabitReply::Incremented { habit, outcome } => {
            match outcome {
                IncrementOutcome::Completed => {
                    write!(out, "{} Done for today!", render_habit(&habit, style))?
                }
                IncrementOutcome::AlreadyAtGoal => {
                    write!(out, "{:?} is already done for today", habit.name)?
                }
                IncrementOutcome::Progressed { .. } | IncrementOutcome::NotFound => {
                    write!(out, "{}", render_habit(&habit, style))?
                }
            }
        }
        HabitReply::HiddenToggled(habit) if habit.is_hidden => write!(out, "Hid {:?}", habit.name)?,
        HabitReply::HiddenToggled(habit) => write!(out, "{:?} is visible again", habit.name)?,
        HabitReply::Deleted(habit) => write!(out, "Deleted {:?}", habit.name)?,
        HabitReply::Reset(summary) => write!(
            out,
            "New day started: {} habits reset, {} completed habits are back",
            summary.reset, summary.restored
        )?,
        HabitReply::Snapshot { habits, .. } => out.push_str(&render_list(&habits, false, style)),
        HabitReply::NotFound(target) => bail!("No habit matches {target}"),
    }
    Ok(out)
}

fn render_time_left(clock: &dyn Clock) -> String {
    let left = time_until_day_end(clock.local_time());
    format!("{} left until the day resets", format_countdown(left))
}

/// Prints the countdown once a second until `shutdown` is cancelled.
pub async fn watch_time_left(clock: &dyn Clock, shutdown: &CancellationToken) {
    loop {
        println!("{}", render_time_left(clock));
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = clock.sleep(Duration::from_secs(1)) => (),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
    use clap::Parser;
    use tokio_util::sync::CancellationToken;

    use crate::{
        habits::entities::HabitRef,
        storage::slot_storage::MemorySlotStorage,
        tracker::create_tracker,
        utils::{
            clock::TestClock,
            color::PALETTE,
            logging::TEST_LOGGING,
        },
    };

    use super::{perform, HabitAction, OutputStyle};

    #[derive(Parser, Debug)]
    struct TestArgs {
        #[command(subcommand)]
        action: HabitAction,
    }

    fn parse(args: &[&str]) -> Result<HabitAction, clap::Error> {
        TestArgs::try_parse_from(std::iter::once("habitick").chain(args.iter().copied()))
            .map(|v| v.action)
    }

    fn test_clock() -> TestClock {
        TestClock::starting_at_local(NaiveDateTime::new(
            NaiveDate::from_ymd_opt(2018, 7, 4).unwrap(),
            NaiveTime::from_hms_opt(22, 15, 0).unwrap(),
        ))
    }

    #[test]
    fn test_parse_add() {
        let action = parse(&["add", "Read", "-g", "3", "-c", "2"]).unwrap();
        assert_eq!(
            action,
            HabitAction::Add {
                name: "Read".into(),
                goal: 3,
                color: Some(PALETTE[1]),
            }
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse(&["add", "Read", "-g", "0"]).is_err());
        assert!(parse(&["add", "Read", "-g", "11"]).is_err());
        assert!(parse(&["add", "   "]).is_err());
        assert!(parse(&["add", "Read", "-c", "#12"]).is_err());
    }

    #[test]
    fn test_parse_habit_reference() {
        let action = parse(&["tick", "Morning run"]).unwrap();
        assert_eq!(
            action,
            HabitAction::Tick {
                habit: HabitRef::Name("Morning run".into())
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_perform_flow() -> Result<()> {
        *TEST_LOGGING;
        let shutdown = CancellationToken::new();
        let storage = Arc::new(MemorySlotStorage::new());
        let (tracker, handle) = create_tracker(storage, test_clock(), &shutdown, false);
        let style = OutputStyle::plain();
        let clock = test_clock();

        let (tracker_result, test_result) = tokio::join!(tracker.run(), async move {
            let out = perform(parse(&["add", "Read", "-g", "2"])?, &handle, &clock, style).await?;
            assert_eq!(out, "Added ■ Read 0/2");

            let out = perform(parse(&["add", "Read", "-g", "1"])?, &handle, &clock, style).await?;
            assert_eq!(out, "Changed goal of \"Read\" to 1 per day");

            let out = perform(parse(&["tick", "Read"])?, &handle, &clock, style).await?;
            assert_eq!(out, "■ Read 1/1 ✓ Done for today!");

            let out = perform(parse(&["tick", "Read"])?, &handle, &clock, style).await?;
            assert_eq!(out, "\"Read\" is already done for today");

            let out = perform(parse(&["hide", "Read"])?, &handle, &clock, style).await?;
            assert_eq!(out, "Hid \"Read\"");

            let out = perform(parse(&["list"])?, &handle, &clock, style).await?;
            assert_eq!(out, "No habits for today");

            let out = perform(parse(&["list", "--all"])?, &handle, &clock, style).await?;
            assert_eq!(out, "■ Read 1/1 ✓ (hidden)");

            let err = perform(parse(&["delete", "Write"])?, &handle, &clock, style)
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), "No habit matches \"Write\"");

            let out = perform(parse(&["left"])?, &handle, &clock, style).await?;
            assert_eq!(out, "01:45:00 left until the day resets");
            anyhow::Ok(())
        });

        tracker_result?;
        test_result?;
        Ok(())
    }
}

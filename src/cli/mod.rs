pub mod action;
pub mod output;
pub mod session;

use std::path::PathBuf;

use action::{perform, watch_time_left, HabitAction};
use anyhow::Result;
use clap::{Parser, Subcommand};
use output::OutputStyle;
use tokio::io::{stdin, stdout, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;

use crate::{
    tracker::{shutdown::detect_shutdown, with_tracker},
    utils::{
        clock::DefaultClock,
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX, SESSION_PREFIX},
        runtime::single_thread_runtime,
    },
};

#[derive(Parser, Debug)]
#[command(name = "habitick", version, long_about = None)]
#[command(about = "Track daily habits from the terminal", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default uses $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Print logs to the console")]
    log: bool,
    #[arg(long = "log-filter", global = true, help = "Log level, overrides RUST_LOG")]
    log_filter: Option<LevelFilter>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(flatten)]
    Action(HabitAction),
    #[command(
        about = "Keep habits open in an interactive prompt. Completed habits disappear after a moment and the day resets at midnight"
    )]
    Session,
}

pub fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = match args.dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)?;
            dir
        }
        None => create_application_default_path()?,
    };

    let logging_level = match (args.log_filter, args.log) {
        (Some(level), _) => Some(level),
        (None, true) => Some(LevelFilter::TRACE),
        (None, false) => None,
    };
    let prefix = match args.commands {
        Commands::Session => SESSION_PREFIX,
        Commands::Action(_) => CLI_PREFIX,
    };
    enable_logging(prefix, &app_dir, logging_level, args.log)?;

    let style = OutputStyle::for_stdout();
    let runtime = single_thread_runtime()?;
    let result = runtime.block_on(async move {
        match args.commands {
            Commands::Action(HabitAction::Left { watch: true }) => {
                let shutdown = CancellationToken::new();
                tokio::join!(
                    detect_shutdown(shutdown.clone()),
                    watch_time_left(&DefaultClock, &shutdown)
                );
                Ok(())
            }
            Commands::Action(action) => {
                // Pending removals are not waited for. A habit completed here stays in the list,
                // marked as done, until the next reset.
                let text = with_tracker(&app_dir, false, |tracker, _| async move {
                    perform(action, &tracker, &DefaultClock, style).await
                })
                .await?;
                println!("{text}");
                Ok(())
            }
            Commands::Session => {
                with_tracker(&app_dir, true, |tracker, shutdown| async move {
                    session::run_session(
                        tracker,
                        &DefaultClock,
                        shutdown,
                        style,
                        BufReader::new(stdin()),
                        stdout(),
                    )
                    .await
                })
                .await
            }
        }
    });
    // A pending stdin read would otherwise keep the runtime from shutting down
    runtime.shutdown_background();
    result
}

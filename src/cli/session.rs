use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_stream::{wrappers::LinesStream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{tracker::request::TrackerHandle, utils::clock::Clock};

use super::{
    action::{perform, HabitAction},
    output::OutputStyle,
};

const PROMPT: &str = "> ";

#[derive(Parser, Debug)]
#[command(name = "habitick", no_binary_name = true, disable_version_flag = true)]
struct SessionLine {
    #[command(subcommand)]
    command: SessionCommand,
}

#[derive(Subcommand, Debug)]
enum SessionCommand {
    #[command(flatten)]
    Action(HabitAction),
    #[command(about = "Leave the session", alias = "exit")]
    Quit,
}

/// Splits a line into words. Single or double quotes keep spaces inside a word.
fn split_words(line: &str) -> Result<Vec<String>> {
    let mut words = vec![];
    let mut current: Option<String> = None;
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match (quote, c) {
            (Some(open), c) if c == open => quote = None,
            (Some(_), c) => current.get_or_insert_with(String::new).push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                current.get_or_insert_with(String::new);
            }
            (None, c) if c.is_whitespace() => words.extend(current.take()),
            (None, c) => current.get_or_insert_with(String::new).push(c),
        }
    }

    if let Some(open) = quote {
        return Err(anyhow!("Missing closing {open}"));
    }
    words.extend(current);
    Ok(words)
}

/// Interactive prompt. Reads one command per line from `input` until `quit`, end of input or
/// shutdown. Mistakes are reported to `output` and don't end the session.
pub async fn run_session(
    tracker: TrackerHandle,
    clock: &dyn Clock,
    shutdown: CancellationToken,
    style: OutputStyle,
    input: impl AsyncBufRead + Unpin,
    mut output: impl AsyncWrite + Unpin,
) -> Result<()> {
    let mut lines = LinesStream::new(input.lines());
    output
        .write_all(b"Type `help` to see available commands\n")
        .await?;

    loop {
        output.write_all(PROMPT.as_bytes()).await?;
        output.flush().await?;

        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next() => line,
        };
        let Some(line) = line else {
            break;
        };
        let line = line?;

        let words = match split_words(&line) {
            Ok(words) if words.is_empty() => continue,
            Ok(words) => words,
            Err(e) => {
                output.write_all(format!("{e}\n").as_bytes()).await?;
                continue;
            }
        };
        debug!("Session command {words:?}");

        let text = match SessionLine::try_parse_from(words) {
            Ok(SessionLine {
                command: SessionCommand::Quit,
            }) => break,
            Ok(SessionLine {
                command: SessionCommand::Action(action),
            }) => match perform(action, &tracker, clock, style).await {
                Ok(text) => text,
                Err(e) => {
                    debug!("Session command failed {e:?}");
                    e.to_string()
                }
            },
            // Help and usage errors are rendered by clap
            Err(e) => e.render().to_string().trim_end().to_string(),
        };
        output.write_all(format!("{text}\n").as_bytes()).await?;
    }

    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}

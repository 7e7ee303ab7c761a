use std::io::IsTerminal;

use ansi_term::{Colour, Style};

use crate::{
    habits::entities::Habit,
    utils::color::{HexColor, PALETTE},
};

const MARKER: &str = "■";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputStyle {
    pub colored: bool,
}

impl OutputStyle {
    pub fn plain() -> Self {
        Self { colored: false }
    }

    /// Colors only when stdout is an interactive terminal.
    pub fn for_stdout() -> Self {
        Self {
            colored: std::io::stdout().is_terminal(),
        }
    }
}

fn paint_marker(color: HexColor, style: OutputStyle) -> String {
    if style.colored {
        Colour::RGB(color.red(), color.green(), color.blue())
            .paint(MARKER)
            .to_string()
    } else {
        MARKER.to_string()
    }
}

/// One line per habit: `■ Read 1/3`, with `✓` once completed.
pub fn render_habit(habit: &Habit, style: OutputStyle) -> String {
    let name = if style.colored && habit.is_completed {
        Style::new().strikethrough().dimmed().paint(&habit.name).to_string()
    } else {
        habit.name.clone()
    };
    let mut line = format!(
        "{} {name} {}/{}",
        paint_marker(habit.color, style),
        habit.progress_today,
        habit.goal_today
    );
    if habit.is_completed {
        line.push_str(" ✓");
    }
    if habit.is_hidden {
        line.push_str(" (hidden)");
    }
    line
}

pub fn render_list(habits: &[Habit], show_hidden: bool, style: OutputStyle) -> String {
    let lines = habits
        .iter()
        .filter(|v| show_hidden || !v.is_hidden)
        .map(|v| render_habit(v, style))
        .collect::<Vec<_>>();
    if lines.is_empty() {
        "No habits for today".to_string()
    } else {
        lines.join("\n")
    }
}

pub fn render_palette(style: OutputStyle) -> String {
    PALETTE
        .iter()
        .enumerate()
        .map(|(index, color)| format!("{} {} {color}", index + 1, paint_marker(*color, style)))
        .collect::<Vec<_>>()
        .join("\n")
}

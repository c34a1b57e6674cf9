use std::io::{IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use crossterm::{
    cursor, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};

use crate::dispatch::ProgressSink;

/// Completions between redraws of the progress line.
const RENDER_EVERY: u64 = 10;
/// Width of the progress bar in cells.
const BAR_SIZE: usize = 30;

/// Progress line on stderr, drawn only when stderr is a terminal.
pub(crate) struct TerminalProgress {
    enabled: bool,
    no_color: bool,
    style: ProgressStyle,
    line_open: AtomicBool,
}

impl TerminalProgress {
    pub(crate) fn new(no_progress: bool, no_color: bool) -> Self {
        Self {
            enabled: !no_progress && std::io::stderr().is_terminal(),
            no_color,
            style: ProgressStyle::new(BAR_SIZE),
            line_open: AtomicBool::new(false),
        }
    }

    /// Ends a line left open by a run that stopped early.
    pub(crate) fn finish(&self) {
        if self.line_open.swap(false, Ordering::AcqRel) {
            drop(finish_progress_line());
        }
    }
}

impl ProgressSink for TerminalProgress {
    fn on_progress(&self, completed: u64, total: u64) {
        if !self.enabled {
            return;
        }
        let done = completed >= total;
        if !done && completed % RENDER_EVERY != 0 {
            return;
        }
        if render_progress_line(&self.style, completed, total, self.no_color).is_err() {
            return;
        }
        let closed = done && finish_progress_line().is_ok();
        self.line_open.store(!closed, Ordering::Release);
    }
}

fn render_progress_line(
    style: &ProgressStyle,
    completed: u64,
    total: u64,
    no_color: bool,
) -> Result<(), std::io::Error> {
    let line = build_progress_line(style, completed, total, no_color);

    let mut out = std::io::stderr();
    queue!(out, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine))?;
    for segment in line {
        if no_color {
            queue!(out, Print(&segment.text))?;
        } else if let Some(color) = segment.color {
            queue!(
                out,
                SetForegroundColor(color),
                Print(&segment.text),
                ResetColor
            )?;
        } else {
            queue!(out, Print(&segment.text))?;
        }
    }
    out.flush()?;
    Ok(())
}

fn finish_progress_line() -> Result<(), std::io::Error> {
    let mut out = std::io::stderr();
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

pub(super) fn build_progress_line(
    style: &ProgressStyle,
    completed: u64,
    total: u64,
    no_color: bool,
) -> Vec<ProgressSegment> {
    let size = style.size.max(1);
    let total = total.max(1);
    let completed = completed.min(total);

    let completed_u128 = u128::from(completed);
    let size_u128 = u128::from(u64::try_from(size).unwrap_or(u64::MAX));
    let total_u128 = u128::from(total);

    let scaled = completed_u128
        .saturating_mul(size_u128)
        .checked_div(total_u128)
        .unwrap_or(0);
    let complete_size = usize::try_from(scaled).unwrap_or(size).min(size);
    let incomplete_size = size.saturating_sub(complete_size);

    let percent_x100 = completed_u128
        .saturating_mul(10_000)
        .checked_div(total_u128)
        .unwrap_or(0);
    let percent_whole = percent_x100.checked_div(100).unwrap_or(0);
    let percent_frac = percent_x100.checked_rem(100).unwrap_or(0);
    let percent_text = format!(" {}.{:02}%", percent_whole, percent_frac);
    let count_text = format!(" | {}/{} requests", completed, total);

    let progress_bar = format!(
        "{}{}{}{}",
        style.begin,
        style.fill.repeat(complete_size),
        style.empty.repeat(incomplete_size),
        style.end
    );

    if no_color {
        vec![
            ProgressSegment::plain(progress_bar),
            ProgressSegment::plain(percent_text),
            ProgressSegment::plain(count_text),
        ]
    } else {
        vec![
            ProgressSegment::plain(progress_bar),
            ProgressSegment::colored(percent_text, Color::Cyan),
            ProgressSegment::colored(count_text, Color::Yellow),
        ]
    }
}

pub(super) struct ProgressStyle {
    size: usize,
    begin: String,
    end: String,
    fill: String,
    empty: String,
}

impl ProgressStyle {
    pub(super) fn new(size: usize) -> Self {
        Self {
            size,
            begin: "[".to_owned(),
            end: "]".to_owned(),
            fill: "#".to_owned(),
            empty: "-".to_owned(),
        }
    }
}

pub(super) struct ProgressSegment {
    pub(super) text: String,
    color: Option<Color>,
}

impl ProgressSegment {
    const fn plain(text: String) -> Self {
        Self { text, color: None }
    }

    const fn colored(text: String, color: Color) -> Self {
        Self {
            text,
            color: Some(color),
        }
    }
}

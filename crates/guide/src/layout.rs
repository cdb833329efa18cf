//! Text rendition of the guide grid and the player screen.
//!
//! Program cells keep the proportions of the on-screen guide: 180 px per
//! half hour, drawn at 10 px per terminal column.

use std::fmt::Write as _;
use std::path::Path;

use chrono::NaiveTime;

use crate::clock::format_clock;
use crate::lineup::{Channel, Lineup, Program, MINUTES_PER_DAY};

pub const PX_PER_HALF_HOUR: u32 = 180;
pub const PX_PER_COLUMN: u32 = 10;

const HEADER_TITLE: &str = "TV GUIDE";
const INFO_COLUMNS: usize = 10;
const SEPARATOR: char = '|';

/// Cell width for a program of `duration_minutes`.
pub fn slot_width_px(duration_minutes: u32) -> u32 {
    duration_minutes.saturating_mul(PX_PER_HALF_HOUR) / 30
}

/// Terminal columns for a cell. A cell is never wider than a whole day.
pub fn slot_columns(duration_minutes: u32) -> usize {
    let day = MINUTES_PER_DAY as u32;
    (slot_width_px(duration_minutes.min(day)) / PX_PER_COLUMN) as usize
}

fn fit(text: &str, width: usize) -> String {
    let mut cell: String = text.chars().take(width).collect();
    let used = cell.chars().count();
    cell.extend(std::iter::repeat(' ').take(width - used));
    cell
}

fn row_columns(channel: &Channel) -> usize {
    channel
        .schedule
        .iter()
        .map(|program| slot_columns(program.duration))
        .sum()
}

fn program_lines(program: &Program) -> [String; 3] {
    [
        program.time.clone(),
        program.show.clone(),
        format!("{} min", program.duration),
    ]
}

/// Renders the header and one three-line row per channel.
pub fn render_guide(lineup: &Lineup, now: NaiveTime) -> String {
    let grid_columns = lineup.channels.iter().map(row_columns).max().unwrap_or(0);
    let total = INFO_COLUMNS + 1 + grid_columns;

    let mut out = String::new();
    out.push_str(&render_header(now, total));
    out.push('\n');
    out.push_str(&"=".repeat(total));
    out.push('\n');

    for channel in &lineup.channels {
        let info = [
            format!("CH {}", channel.number),
            channel.network.clone(),
            String::new(),
        ];
        let cells: Vec<[String; 3]> = channel.schedule.iter().map(program_lines).collect();
        for line in 0..3 {
            let mut text = fit(&info[line], INFO_COLUMNS);
            for (program, lines) in channel.schedule.iter().zip(&cells) {
                let width = slot_columns(program.duration).saturating_sub(1);
                text.push(SEPARATOR);
                text.push_str(&fit(&lines[line], width));
            }
            out.push_str(text.trim_end());
            out.push('\n');
        }
        out.push_str(&"-".repeat(total));
        out.push('\n');
    }
    out
}

/// `TV GUIDE` on the left, the clock right-aligned to `width`.
pub fn render_header(now: NaiveTime, width: usize) -> String {
    let clock = format_clock(now);
    let gap = width
        .saturating_sub(HEADER_TITLE.len() + clock.len())
        .max(1);
    format!("{HEADER_TITLE}{}{clock}", " ".repeat(gap))
}

pub fn render_player(channel: &Channel, video: &Path) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Now playing: CH {} {}", channel.number, channel.network);
    let _ = writeln!(out, "  {}", video.display());
    let _ = writeln!(out, "[ Back to Guide ]");
    out
}

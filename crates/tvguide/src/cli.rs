use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "tvguide",
    author,
    version,
    about = "Retro TV guide with a CRT overlay",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Overlay settings file (defaults to `overlay.toml` in the config directory).
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Open a normal-sized window instead of covering the screen.
    #[arg(long)]
    pub windowed: bool,

    /// Let the overlay window receive pointer input.
    #[arg(long)]
    pub interactive: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the channel grid.
    Guide(GuideArgs),
    /// Tune to a channel and resolve its video.
    Play(PlayArgs),
    /// List video files in a directory, or delete them with `--clear --yes`.
    Videos(VideosArgs),
    /// Drive the overlay headlessly for a number of refreshes and report each frame.
    Simulate(SimulateArgs),
    /// Inspect configuration.
    Config(ConfigCommand),
}

#[derive(Parser, Debug)]
pub struct GuideArgs {
    /// Lineup file (defaults to `lineup.toml` in the config directory, then the built-in lineup).
    #[arg(long, value_name = "FILE")]
    pub lineup: Option<PathBuf>,

    /// Keep running and refresh the header clock every second.
    #[arg(long)]
    pub watch: bool,

    /// Show this time in the header instead of the wall clock (e.g. `6:15 PM`).
    #[arg(long, value_name = "TIME", value_parser = parse_clock_time, conflicts_with = "watch")]
    pub at: Option<chrono::NaiveTime>,
}

#[derive(Parser, Debug)]
pub struct PlayArgs {
    /// Channel number as printed in the guide (e.g. `19`).
    #[arg(value_name = "CHANNEL")]
    pub channel: String,

    #[arg(long, value_name = "FILE")]
    pub lineup: Option<PathBuf>,

    /// Directory the lineup's video paths are relative to.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub media_root: PathBuf,

    /// Launch this player with the resolved video (e.g. `mpv`).
    #[arg(long, value_name = "CMD")]
    pub player: Option<String>,
}

#[derive(Parser, Debug)]
pub struct VideosArgs {
    #[arg(value_name = "DIR", default_value = guide::library::DEFAULT_VIDEO_DIR)]
    pub dir: PathBuf,
    /// Delete every video file in DIR.
    #[arg(long, requires = "yes")]
    pub clear: bool,
    /// Confirm a destructive action.
    #[arg(long)]
    pub yes: bool,
}

#[derive(Parser, Debug)]
pub struct SimulateArgs {
    /// Number of display refreshes to simulate.
    #[arg(long, value_name = "N", default_value_t = 3)]
    pub frames: u32,

    /// Viewport size in pixels.
    #[arg(long, value_name = "WIDTHxHEIGHT", default_value = "1280x720", value_parser = parse_size)]
    pub size: (u32, u32),

    /// Simulated display refresh rate.
    #[arg(long, value_name = "HZ", default_value_t = 60)]
    pub hz: u32,
}

#[derive(Parser, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print resolved configuration paths.
    Where,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT, e.g. 1280x720".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid width in size".to_string())?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid height in size".to_string())?;
    if width == 0 || height == 0 {
        return Err("size must be greater than zero".into());
    }
    Ok((width, height))
}

pub fn parse_clock_time(value: &str) -> Result<chrono::NaiveTime, String> {
    let trimmed = value.trim();
    chrono::NaiveTime::parse_from_str(trimmed, guide::lineup::SLOT_TIME_FORMAT)
        .or_else(|_| chrono::NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .map_err(|_| format!("invalid time '{trimmed}'; expected e.g. '6:15 PM' or '18:15'"))
}

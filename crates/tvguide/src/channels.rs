//! `guide`, `play` and `videos` subcommands.

use std::io::Write;
use std::path::Path;
use std::process::Command;
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{Local, NaiveTime};
use guide::{format_size, layout, GuideTicker, Lineup, VideoEntry, VideoLibrary, ViewState};

use crate::cli::{GuideArgs, PlayArgs, VideosArgs};
use crate::paths::AppPaths;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// An explicit `--lineup` must exist; the config-directory lineup is optional.
pub fn load_lineup(explicit: Option<&Path>, paths: &AppPaths) -> Result<Lineup> {
    if let Some(path) = explicit {
        return Lineup::load(path)
            .with_context(|| format!("failed to load lineup {}", path.display()));
    }
    let path = paths.lineup_file();
    if path.exists() {
        return Lineup::load(&path)
            .with_context(|| format!("failed to load lineup {}", path.display()));
    }
    tracing::debug!(path = %path.display(), "no lineup file; using built-in lineup");
    Ok(Lineup::default())
}

fn wall_clock() -> NaiveTime {
    Local::now().time()
}

pub fn run_guide(args: GuideArgs, paths: &AppPaths) -> Result<()> {
    let lineup = load_lineup(args.lineup.as_deref(), paths)?;
    let now = args.at.unwrap_or_else(wall_clock);
    print!("{}", layout::render_guide(&lineup, now));

    if !args.watch {
        return Ok(());
    }

    let mut ticker = GuideTicker::new(Instant::now());
    let mut stdout = std::io::stdout();
    loop {
        let deadline = ticker.next_deadline();
        thread::sleep(deadline.saturating_duration_since(Instant::now()));
        if ticker.poll(Instant::now()) {
            write!(
                stdout,
                "{CLEAR_SCREEN}{}",
                layout::render_guide(&lineup, wall_clock())
            )?;
            stdout.flush()?;
        }
    }
}

pub fn run_play(args: PlayArgs, paths: &AppPaths) -> Result<()> {
    let lineup = load_lineup(args.lineup.as_deref(), paths)?;
    let mut view = ViewState::default();
    let channel = view.select_number(&lineup, &args.channel)?;
    let video = channel.video_path(&args.media_root);

    print!("{}", layout::render_player(channel, &video));
    if !video.is_file() {
        tracing::warn!(path = %video.display(), "video file not found");
    }

    if let Some(player) = args.player.as_deref() {
        tracing::info!(player, video = %video.display(), "launching player");
        let status = Command::new(player)
            .arg(&video)
            .status()
            .with_context(|| format!("failed to launch player '{player}'"))?;
        if !status.success() {
            tracing::warn!(player, %status, "player exited with an error");
        }
    }

    view.back();
    Ok(())
}

fn video_line(entry: &VideoEntry) -> String {
    let size = format_size(entry.size_bytes);
    match &entry.metadata {
        Some(listing) => format!(
            "  {}  {size}  {} {}",
            entry.file, listing.start_time, listing.title
        )
        .trim_end()
        .to_owned(),
        None => format!("  {}  {size}", entry.file),
    }
}

pub fn run_videos(args: VideosArgs) -> Result<()> {
    if args.clear {
        let removed = VideoLibrary::clear(&args.dir)
            .with_context(|| format!("failed to clear videos in {}", args.dir.display()))?;
        println!("Deleted {removed} video files from {}", args.dir.display());
        return Ok(());
    }

    let library = VideoLibrary::scan(&args.dir)
        .with_context(|| format!("failed to scan videos in {}", args.dir.display()))?;
    if library.is_empty() {
        println!("No videos found in {}", library.root().display());
        return Ok(());
    }
    println!(
        "Videos in {} ({}):",
        library.root().display(),
        format_size(library.total_size())
    );
    for (number, entries) in library.by_channel() {
        let callsign = entries
            .iter()
            .filter_map(|entry| entry.metadata.as_ref())
            .map(|listing| listing.station_callsign.as_str())
            .find(|callsign| !callsign.is_empty())
            .unwrap_or("-");
        println!("CH {number} {callsign}");
        for entry in entries {
            println!("{}", video_line(entry));
        }
    }
    let unlisted: Vec<&VideoEntry> = library.unlisted().collect();
    if !unlisted.is_empty() {
        println!("Unlisted");
        for entry in unlisted {
            println!("{}", video_line(entry));
        }
    }
    Ok(())
}


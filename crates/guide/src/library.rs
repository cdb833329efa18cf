use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::GuideError;

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv"];

/// Default video directory, relative to the working directory.
pub const DEFAULT_VIDEO_DIR: &str = "./videos";

/// Extension of the metadata file stored next to a video.
pub const METADATA_EXTENSION: &str = "json";

pub fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// `512 B`, `1.5 KB`, `12.0 MB`, `1.25 GB`.
pub fn format_size(size_bytes: u64) -> String {
    if size_bytes < 1024 {
        return format!("{size_bytes} B");
    }
    let kb = size_bytes as f64 / 1024.0;
    if kb < 1024.0 {
        return format!("{kb:.1} KB");
    }
    let mb = kb / 1024.0;
    if mb < 1024.0 {
        return format!("{mb:.1} MB");
    }
    format!("{:.2} GB", mb / 1024.0)
}

/// Guide listing stored beside a video as `<stem>.json`.
///
/// Sidecars are written by other tools, so unknown keys are ignored and
/// missing ones take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VideoMetadata {
    pub title: String,
    pub station: String,
    pub description: String,
    pub year: String,
    /// Free text such as `28 min`.
    pub duration: String,
    pub category: String,
    pub channel_number: u8,
    pub timeslot: String,
    pub day_of_week: String,
    pub start_time: String,
    pub end_time: String,
    pub thumbnail_url: String,
    pub tags: Vec<String>,
    pub original_id: String,
    pub download_date: String,
    pub station_callsign: String,
    pub is_featured: bool,
}

impl VideoMetadata {
    pub fn from_json_str(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoEntry {
    pub file: String,
    pub size_bytes: u64,
    pub metadata: Option<VideoMetadata>,
}

/// A sidecar that is missing yields `None`; one that cannot be read or
/// parsed is logged and also yields `None`.
fn read_sidecar(video: &Path) -> Option<VideoMetadata> {
    let path = video.with_extension(METADATA_EXTENSION);
    if !path.is_file() {
        return None;
    }
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to read video metadata");
            return None;
        }
    };
    match VideoMetadata::from_json_str(&contents) {
        Ok(metadata) => Some(metadata),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "ignoring malformed video metadata");
            None
        }
    }
}

/// Video files found directly inside one directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoLibrary {
    root: PathBuf,
    entries: Vec<VideoEntry>,
}

impl VideoLibrary {
    /// Lists video files in `dir`, sorted by name, with their sizes and
    /// sidecar metadata. Subdirectories are not descended into.
    pub fn scan(dir: &Path) -> Result<Self, GuideError> {
        let mut entries = Vec::new();
        for path in video_paths(dir)? {
            let Some(file) = path.file_name().and_then(|name| name.to_str()) else {
                tracing::warn!(path = %path.display(), "skipping video with non UTF-8 name");
                continue;
            };
            let size_bytes = fs::metadata(&path)
                .map_err(|err| GuideError::io(&path, err))?
                .len();
            entries.push(VideoEntry {
                file: file.to_owned(),
                size_bytes,
                metadata: read_sidecar(&path),
            });
        }
        entries.sort_by(|a, b| a.file.cmp(&b.file));
        tracing::debug!(dir = %dir.display(), count = entries.len(), "scanned video library");
        Ok(Self {
            root: dir.to_path_buf(),
            entries,
        })
    }

    /// Deletes every video file directly inside `dir` and returns how many
    /// were removed. Sidecars and other files are left alone.
    pub fn clear(dir: &Path) -> Result<usize, GuideError> {
        let mut removed = 0;
        for path in video_paths(dir)? {
            fs::remove_file(&path).map_err(|err| GuideError::io(&path, err))?;
            tracing::debug!(path = %path.display(), "deleted video");
            removed += 1;
        }
        tracing::info!(dir = %dir.display(), removed, "cleared video library");
        Ok(removed)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entries(&self) -> &[VideoEntry] {
        &self.entries
    }

    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.file.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|entry| entry.size_bytes).sum()
    }

    pub fn path_of(&self, file: &str) -> Option<PathBuf> {
        self.entries
            .iter()
            .any(|entry| entry.file == file)
            .then(|| self.root.join(file))
    }

    /// Videos with metadata, grouped by channel number and ordered by start
    /// time within each channel.
    pub fn by_channel(&self) -> BTreeMap<u8, Vec<&VideoEntry>> {
        let mut channels: BTreeMap<u8, Vec<&VideoEntry>> = BTreeMap::new();
        for entry in &self.entries {
            if let Some(metadata) = &entry.metadata {
                channels.entry(metadata.channel_number).or_default().push(entry);
            }
        }
        for entries in channels.values_mut() {
            entries.sort_by_key(|entry| {
                entry
                    .metadata
                    .as_ref()
                    .map(|metadata| metadata.start_time.clone())
            });
        }
        channels
    }

    pub fn unlisted(&self) -> impl Iterator<Item = &VideoEntry> {
        self.entries.iter().filter(|entry| entry.metadata.is_none())
    }
}

fn video_paths(dir: &Path) -> Result<Vec<PathBuf>, GuideError> {
    let entries = fs::read_dir(dir).map_err(|err| GuideError::io(dir, err))?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|err| GuideError::io(dir, err))?.path();
        if path.is_file() && is_video(&path) {
            paths.push(path);
        }
    }
    Ok(paths)
}

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::GuideError;

/// Format of schedule slot start times, e.g. `6:00 PM`.
pub const SLOT_TIME_FORMAT: &str = "%I:%M %p";

/// Schedules run within one day; no program may end after midnight.
pub const MINUTES_PER_DAY: i64 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u32);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One slot in a channel's schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Program {
    /// Start time as printed in the guide, `h:MM AM/PM`.
    pub time: String,
    pub show: String,
    /// Length in minutes.
    pub duration: u32,
}

impl Program {
    pub fn new(time: &str, show: &str, duration: u32) -> Self {
        Self {
            time: time.to_owned(),
            show: show.to_owned(),
            duration,
        }
    }

    pub fn start(&self) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(self.time.trim(), SLOT_TIME_FORMAT).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Channel {
    pub id: ChannelId,
    /// Dial number shown as `CH <number>`.
    pub number: String,
    pub network: String,
    /// Media path as served, e.g. `/videos/sample.mp4`.
    pub video: String,
    pub schedule: Vec<Program>,
}

impl Channel {
    /// Where this channel's video lives below `media_root`.
    pub fn video_path(&self, media_root: &Path) -> PathBuf {
        media_root.join(self.video.trim_start_matches('/'))
    }
}

/// Ordered channel lineup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Lineup {
    #[serde(rename = "channel", default)]
    pub channels: Vec<Channel>,
}

impl Default for Lineup {
    /// The built-in Cleveland-area lineup.
    fn default() -> Self {
        fn channel(id: u32, number: &str, network: &str, video: &str, schedule: Vec<Program>) -> Channel {
            Channel {
                id: ChannelId(id),
                number: number.to_owned(),
                network: network.to_owned(),
                video: video.to_owned(),
                schedule,
            }
        }

        Self {
            channels: vec![
                channel(
                    1,
                    "3",
                    "WKYC",
                    "/videos/WKYC 6pm News, June 2001.ia.mp4",
                    vec![
                        Program::new("6:00 PM", "Evening News", 30),
                        Program::new("6:30 PM", "NBC Nightly News", 30),
                        Program::new("7:00 PM", "Entertainment Tonight", 30),
                        Program::new("7:30 PM", "Family Ties", 30),
                    ],
                ),
                channel(
                    2,
                    "4",
                    "WUAB",
                    "/videos/CaptureA_3483.mp4",
                    vec![
                        Program::new("6:00 PM", "Movie: Back to the Future", 150),
                        Program::new("8:30 PM", "Local Programming", 30),
                    ],
                ),
                channel(
                    3,
                    "5",
                    "WEWS",
                    "/videos/sample.mp4",
                    vec![
                        Program::new("6:00 PM", "ABC World News", 30),
                        Program::new("6:30 PM", "Wheel of Fortune", 30),
                        Program::new("7:00 PM", "Jeopardy!", 30),
                        Program::new("7:30 PM", "Inside Edition", 30),
                    ],
                ),
                channel(
                    4,
                    "8",
                    "WJW",
                    "/videos/sample.mp4",
                    vec![
                        Program::new("6:00 PM", "FOX 8 News", 60),
                        Program::new("7:00 PM", "The Simpsons", 30),
                        Program::new("7:30 PM", "Married... with Children", 30),
                    ],
                ),
                channel(
                    5,
                    "19",
                    "WOIO",
                    "/videos/sample.mp4",
                    vec![
                        Program::new("6:00 PM", "CBS Evening News", 30),
                        Program::new("6:30 PM", "Access Hollywood", 30),
                        Program::new("7:00 PM", "Movie: Raiders of the Lost Ark", 120),
                    ],
                ),
                channel(
                    6,
                    "25",
                    "WVIZ",
                    "/videos/sample.mp4",
                    vec![
                        Program::new("6:00 PM", "PBS NewsHour", 60),
                        Program::new("7:00 PM", "Nature: Arctic Wildlife", 90),
                        Program::new("8:30 PM", "Nova", 30),
                    ],
                ),
            ],
        }
    }
}

impl Lineup {
    pub fn from_toml_str(input: &str) -> Result<Self, GuideError> {
        let raw: Lineup = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, GuideError> {
        let contents = std::fs::read_to_string(path).map_err(|err| GuideError::io(path, err))?;
        let lineup = Self::from_toml_str(&contents)?;
        tracing::debug!(
            path = %path.display(),
            channels = lineup.channels.len(),
            "loaded lineup"
        );
        Ok(lineup)
    }

    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.iter().find(|channel| channel.id == id)
    }

    /// Looks a channel up by its dial number, e.g. `"19"`.
    pub fn by_number(&self, number: &str) -> Option<&Channel> {
        let number = number.trim();
        self.channels.iter().find(|channel| channel.number == number)
    }

    pub fn validate(&self) -> Result<(), GuideError> {
        if self.channels.is_empty() {
            return Err(GuideError::Invalid(
                "lineup must define at least one channel".into(),
            ));
        }

        let mut ids = HashSet::new();
        let mut numbers = HashSet::new();
        for channel in &self.channels {
            if !ids.insert(channel.id) {
                return Err(GuideError::Invalid(format!(
                    "channel id {} is used more than once",
                    channel.id.0
                )));
            }
            if channel.number.trim().is_empty() {
                return Err(GuideError::Invalid(format!(
                    "channel {} has an empty number",
                    channel.id
                )));
            }
            if !numbers.insert(channel.number.as_str()) {
                return Err(GuideError::Invalid(format!(
                    "channel number '{}' is used more than once",
                    channel.number
                )));
            }
            if channel.schedule.is_empty() {
                return Err(GuideError::Invalid(format!(
                    "channel '{}' must list at least one program",
                    channel.number
                )));
            }
            validate_schedule(channel)?;
        }

        Ok(())
    }
}

fn validate_schedule(channel: &Channel) -> Result<(), GuideError> {
    let mut previous_end: Option<i64> = None;
    for program in &channel.schedule {
        if program.duration == 0 {
            return Err(GuideError::Invalid(format!(
                "channel '{}' program '{}' duration must be > 0",
                channel.number, program.show
            )));
        }
        let start = program.start().ok_or_else(|| {
            GuideError::Invalid(format!(
                "channel '{}' program '{}' has invalid start time '{}'; expected e.g. '6:30 PM'",
                channel.number, program.show, program.time
            ))
        })?;
        let start_minute = i64::from(start.hour() * 60 + start.minute());
        if let Some(end) = previous_end {
            if start_minute < end {
                return Err(GuideError::Invalid(format!(
                    "channel '{}' program '{}' starts before the previous program ends",
                    channel.number, program.show
                )));
            }
            if start_minute > end {
                tracing::debug!(
                    channel = %channel.number,
                    gap_minutes = start_minute - end,
                    "schedule gap"
                );
            }
        }
        let end_minute = start_minute + i64::from(program.duration);
        if end_minute > MINUTES_PER_DAY {
            return Err(GuideError::Invalid(format!(
                "channel '{}' program '{}' runs past midnight",
                channel.number, program.show
            )));
        }
        previous_end = Some(end_minute);
    }
    Ok(())
}

//! Channel lineup, schedule grid layout, and view state for the TV guide.
//!
//! The lineup is plain data (built in, or loaded from `lineup.toml`). The
//! guide screen is rendered as text by [`layout`]; selecting a channel moves
//! the [`ViewState`] to the player, which resolves the channel's video file.
//! The local [`VideoLibrary`] reads per-video JSON listings when present.

pub mod clock;
mod error;
pub mod layout;
pub mod library;
pub mod lineup;
pub mod view;

pub use clock::{format_clock, GuideTicker};
pub use error::GuideError;
pub use layout::{render_guide, render_player, slot_width_px};
pub use library::{format_size, VideoEntry, VideoLibrary, VideoMetadata};
pub use lineup::{Channel, ChannelId, Lineup, Program};
pub use view::ViewState;

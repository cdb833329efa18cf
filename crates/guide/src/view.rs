use crate::error::GuideError;
use crate::lineup::{Channel, ChannelId, Lineup};

/// What the guide is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewState {
    #[default]
    Guide,
    Player(ChannelId),
}

impl ViewState {
    /// Switches to the player for `id`. An unknown channel leaves the view
    /// unchanged.
    pub fn select<'a>(
        &mut self,
        lineup: &'a Lineup,
        id: ChannelId,
    ) -> Result<&'a Channel, GuideError> {
        let channel = lineup
            .channel(id)
            .ok_or_else(|| GuideError::UnknownChannel(id.to_string()))?;
        tracing::debug!(channel = %channel.number, network = %channel.network, "tuned in");
        *self = ViewState::Player(id);
        Ok(channel)
    }

    /// Same as [`ViewState::select`], addressed by dial number.
    pub fn select_number<'a>(
        &mut self,
        lineup: &'a Lineup,
        number: &str,
    ) -> Result<&'a Channel, GuideError> {
        let id = lineup
            .by_number(number)
            .map(|channel| channel.id)
            .ok_or_else(|| GuideError::UnknownChannel(format!("CH {}", number.trim())))?;
        self.select(lineup, id)
    }

    pub fn back(&mut self) {
        *self = ViewState::Guide;
    }
}

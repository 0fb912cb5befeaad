use serde::{Deserialize, Serialize};

use crate::error::PatternError;
use crate::DRUM_CHANNEL_COUNT;

/// Percussion family of a drum channel. Together with the variant it selects a generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DrumKind {
    Kick,
    Snare,
    ClosedHat,
    OpenHat,
    Clap,
    Tom,
    Rim,
    Cowbell,
    Cymbal,
}

impl DrumKind {
    /// Default kind for each channel index.
    pub const LAYOUT: [DrumKind; DRUM_CHANNEL_COUNT] = [
        DrumKind::Kick,
        DrumKind::Snare,
        DrumKind::ClosedHat,
        DrumKind::OpenHat,
        DrumKind::Clap,
        DrumKind::Tom,
        DrumKind::Rim,
        DrumKind::Cowbell,
        DrumKind::Cymbal,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            DrumKind::Kick => "kick",
            DrumKind::Snare => "snare",
            DrumKind::ClosedHat => "closedhat",
            DrumKind::OpenHat => "openhat",
            DrumKind::Clap => "clap",
            DrumKind::Tom => "tom",
            DrumKind::Rim => "rim",
            DrumKind::Cowbell => "cowbell",
            DrumKind::Cymbal => "cymbal",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::LAYOUT.into_iter().find(|kind| kind.tag() == tag)
    }
}

/// One of the nine fixed percussion slots.
///
/// `index` is what drum-hit lists store and what triggers audio; `color_id` only
/// selects the display colour. The two are never interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrumChannel {
    pub index: usize,
    pub kind: DrumKind,
    /// 0 disables the channel.
    pub variant: u8,
    /// 0..=100.
    pub volume: u8,
    pub color_id: usize,
}

impl DrumChannel {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            kind: DrumKind::LAYOUT[index % DRUM_CHANNEL_COUNT],
            variant: if index < 5 { 1 } else { 0 },
            volume: 80,
            color_id: index,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.variant != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrumKit {
    pub channels: [DrumChannel; DRUM_CHANNEL_COUNT],
    /// 0..=100.
    pub master_volume: u8,
}

impl Default for DrumKit {
    fn default() -> Self {
        Self {
            channels: std::array::from_fn(DrumChannel::new),
            master_volume: 80,
        }
    }
}

impl DrumKit {
    pub fn channel(&self, index: usize) -> Option<&DrumChannel> {
        self.channels.get(index)
    }

    pub fn channel_mut(&mut self, index: usize) -> Option<&mut DrumChannel> {
        self.channels.get_mut(index)
    }

    /// Exchanges the display colours of two channels. Audio indices are untouched.
    pub fn swap_colors(&mut self, a: usize, b: usize) -> Result<(), PatternError> {
        if a >= DRUM_CHANNEL_COUNT {
            return Err(PatternError::ChannelOutOfRange(a));
        }
        if b >= DRUM_CHANNEL_COUNT {
            return Err(PatternError::ChannelOutOfRange(b));
        }
        let color_a = self.channels[a].color_id;
        self.channels[a].color_id = self.channels[b].color_id;
        self.channels[b].color_id = color_a;
        Ok(())
    }

    pub fn color_of(&self, index: usize) -> Option<usize> {
        self.channel(index).map(|c| c.color_id)
    }

    pub fn channel_with_color(&self, color_id: usize) -> Option<usize> {
        self.channels
            .iter()
            .find(|c| c.color_id == color_id)
            .map(|c| c.index)
    }

    /// True when the colour ids are a permutation of `0..DRUM_CHANNEL_COUNT`.
    pub fn colors_are_permutation(&self) -> bool {
        let mut seen = [false; DRUM_CHANNEL_COUNT];
        for channel in &self.channels {
            match seen.get_mut(channel.color_id) {
                Some(slot) if !*slot => *slot = true,
                _ => return false,
            }
        }
        true
    }

    pub fn reset_colors(&mut self) {
        for channel in self.channels.iter_mut() {
            channel.color_id = channel.index;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_kit_has_identity_colors() {
        let kit = DrumKit::default();
        for (i, channel) in kit.channels.iter().enumerate() {
            assert_eq!(channel.index, i);
            assert_eq!(channel.color_id, i);
        }
        assert!(kit.colors_are_permutation());
    }

    #[test]
    fn swaps_keep_a_permutation() {
        let mut kit = DrumKit::default();
        let swaps = [(0, 8), (3, 4), (8, 3), (1, 1), (2, 7), (0, 5), (6, 0)];
        for (a, b) in swaps {
            kit.swap_colors(a, b).unwrap();
            assert!(kit.colors_are_permutation());
        }
        assert_eq!(kit.channel_with_color(kit.color_of(4).unwrap()), Some(4));
    }

    #[test]
    fn swap_out_of_range_is_rejected() {
        let mut kit = DrumKit::default();
        assert_eq!(kit.swap_colors(0, 9), Err(PatternError::ChannelOutOfRange(9)));
        assert!(kit.colors_are_permutation());
    }

    #[test]
    fn kind_tags_round_trip() {
        for kind in DrumKind::LAYOUT {
            assert_eq!(DrumKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(DrumKind::from_tag("gong"), None);
    }
}

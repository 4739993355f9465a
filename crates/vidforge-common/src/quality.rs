//! The rendition quality ladder.
//!
//! Eight levels from 144p up to 4K, totally ordered by target height. On the
//! wire a quality is its numeric level (`0` = 144p … `7` = 4K); on disk and in
//! logs it is its label.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One level of the quality ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Quality {
    P144 = 0,
    P240 = 1,
    P360 = 2,
    P480 = 3,
    P720 = 4,
    P1080 = 5,
    K2 = 6,
    K4 = 7,
}

/// Encoder settings for one quality level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingProfile {
    /// Target vertical resolution; width follows the source aspect ratio.
    pub height: u32,
    /// Constant rate factor (lower is better).
    pub crf: u8,
    /// Encoder speed preset.
    pub preset: &'static str,
    /// Maximum video bitrate.
    pub video_bitrate: &'static str,
    /// Audio bitrate.
    pub audio_bitrate: &'static str,
}

impl Quality {
    /// Every level, lowest first.
    pub const ALL: [Quality; 8] = [
        Quality::P144,
        Quality::P240,
        Quality::P360,
        Quality::P480,
        Quality::P720,
        Quality::P1080,
        Quality::K2,
        Quality::K4,
    ];

    /// The lowest level, used when a source is smaller than every level.
    pub const LOWEST: Quality = Quality::P144;

    /// Numeric level as sent on the wire and stored as `max_quality`.
    pub const fn level(self) -> u8 {
        self as u8
    }

    /// Look up a level by its number.
    pub fn from_level(level: u8) -> Option<Self> {
        Self::ALL.get(level as usize).copied()
    }

    /// Target vertical resolution in pixels.
    pub const fn height(self) -> u32 {
        self.encoding().height
    }

    /// Human-readable label, also used as the rendition directory name.
    pub const fn label(self) -> &'static str {
        match self {
            Self::P144 => "144p",
            Self::P240 => "240p",
            Self::P360 => "360p",
            Self::P480 => "480p",
            Self::P720 => "720p",
            Self::P1080 => "1080p",
            Self::K2 => "2K",
            Self::K4 => "4K",
        }
    }

    /// Encoder settings for this level.
    pub const fn encoding(self) -> EncodingProfile {
        let (height, crf, video_bitrate) = match self {
            Self::P144 => (144, 23, "100k"),
            Self::P240 => (240, 23, "300k"),
            Self::P360 => (360, 23, "500k"),
            Self::P480 => (480, 23, "1000k"),
            Self::P720 => (720, 23, "2500k"),
            Self::P1080 => (1080, 23, "5000k"),
            Self::K2 => (1440, 23, "8000k"),
            Self::K4 => (2160, 16, "16000k"),
        };
        let audio_bitrate = match self {
            Self::K4 => "192k",
            _ => "128k",
        };
        EncodingProfile {
            height,
            crf,
            preset: "slow",
            video_bitrate,
            audio_bitrate,
        }
    }

    /// The next lower level, if any.
    pub fn lower(self) -> Option<Self> {
        self.level().checked_sub(1).and_then(Self::from_level)
    }

    /// Renditions to produce for a source of the given height, lowest first.
    ///
    /// Contains every level whose target height does not exceed the source.
    /// A source smaller than every level still gets the lowest one.
    pub fn ladder_for_height(source_height: u32) -> Vec<Self> {
        let ladder: Vec<Self> = Self::ALL
            .into_iter()
            .filter(|q| q.height() <= source_height)
            .collect();
        if ladder.is_empty() {
            vec![Self::LOWEST]
        } else {
            ladder
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when parsing an unknown quality label or level.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown video quality: {0}")]
pub struct UnknownQuality(pub String);

impl FromStr for Quality {
    type Err = UnknownQuality;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|q| q.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownQuality(s.to_string()))
    }
}

impl TryFrom<u8> for Quality {
    type Error = UnknownQuality;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Self::from_level(level).ok_or_else(|| UnknownQuality(level.to_string()))
    }
}

impl From<Quality> for u8 {
    fn from(q: Quality) -> Self {
        q.level()
    }
}

//! Typed ID wrappers.
//!
//! Video IDs are assigned by the database when an upload starts, so unlike
//! random UUIDs they are plain integers. The newtype keeps them from being
//! mixed up with segment indices or quality levels.

use serde::{Deserialize, Serialize};

/// Identifier of a video row, assigned on upload start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(i64);

impl VideoId {
    /// Wrap a raw database row id.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// The raw row id.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for VideoId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl From<VideoId> for i64 {
    fn from(id: VideoId) -> Self {
        id.0
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for VideoId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

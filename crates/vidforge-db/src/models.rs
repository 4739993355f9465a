//! Rust models matching the database schema, plus the page envelope every
//! listing is returned in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vidforge_common::{Quality, VideoId};

/// Value of `length` while a video is still being processed.
pub const PENDING_LENGTH: f64 = -1.0;

/// Value of `num_segments` and `max_quality` while a video is pending.
pub const PENDING_MARKER: i64 = -1;

/// User account, including password material. Never sent to clients.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub username: String,
    pub password_hash: String,
    pub joined_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Public view of a user as shown in listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSummary {
    pub username: String,
    pub joined_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            joined_at: user.joined_at,
            last_login: user.last_login,
        }
    }
}

/// A video row.
///
/// Pending rows carry the sentinel values ([`PENDING_LENGTH`],
/// [`PENDING_MARKER`]) until the top rendition finishes encoding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Video {
    pub id: VideoId,
    pub author: String,
    pub title: String,
    /// Duration in seconds, `-1` while pending.
    pub length: f64,
    /// Segments in the top rendition, `-1` while pending.
    pub num_segments: i64,
    /// Numeric level of the top rendition, `-1` while pending.
    pub max_quality: i64,
    pub created_at: DateTime<Utc>,
}

impl Video {
    /// Whether the video has been finalized and can be played.
    pub fn is_ready(&self) -> bool {
        self.length > 0.0 && self.num_segments > 0 && self.max_quality >= 0
    }

    /// Highest rendition available, once ready.
    pub fn top_quality(&self) -> Option<Quality> {
        u8::try_from(self.max_quality)
            .ok()
            .and_then(Quality::from_level)
    }

    /// Number of segments, once ready.
    pub fn segment_count(&self) -> Option<u32> {
        u32::try_from(self.num_segments).ok().filter(|n| *n > 0)
    }
}

/// Public view of a video as shown in listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoSummary {
    pub id: VideoId,
    pub title: String,
    pub author: String,
    pub length: f64,
}

/// One page of a listing.
///
/// `max_page` is zero-based: a listing of `N` items with `P` per page has
/// pages `0..=N / P`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    #[serde(rename = "result")]
    pub items: Vec<T>,
    pub current_page: u32,
    pub max_page: u32,
    pub items_per_page: u32,
    #[serde(rename = "number_of_items")]
    pub total_count: u64,
}

impl<T> Page<T> {
    /// Assemble a page and derive `max_page` from the totals.
    pub fn new(items: Vec<T>, current_page: u32, items_per_page: u32, total_count: u64) -> Self {
        let per_page = u64::from(items_per_page.max(1));
        let max_page = u32::try_from(total_count / per_page).unwrap_or(u32::MAX);
        Self {
            items,
            current_page,
            max_page,
            items_per_page,
            total_count,
        }
    }

    /// Row offset of the first item on `page`.
    pub fn offset(page: u32, items_per_page: u32) -> u64 {
        u64::from(page) * u64::from(items_per_page)
    }
}

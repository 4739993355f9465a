//! Source probing.
//!
//! Only the handful of properties the pipeline needs are extracted: frame
//! size decides the quality ladder, duration decides the segment count and
//! the thumbnail position.

mod ffprobe;

pub use ffprobe::{parse_ffprobe_output, probe_with_ffprobe};

use serde::{Deserialize, Serialize};

/// Frame rate assumed when the source does not report a usable one.
pub const DEFAULT_FPS: f64 = 30.0;

/// Probed properties of an uploaded source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub codec: String,
    /// Duration in seconds.
    pub duration: f64,
}

impl SourceInfo {
    /// Number of segments a rendition of this source splits into.
    pub fn expected_segments(&self, segment_duration: f64) -> u32 {
        if segment_duration <= 0.0 || self.duration <= 0.0 {
            return 0;
        }
        (self.duration / segment_duration).ceil() as u32
    }
}

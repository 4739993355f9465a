//! On-disk storage layout.
//!
//! ```text
//! <data_dir>/videos/<video_id>/
//!     original.<ext>
//!     thumbnail.jpg
//!     <quality label>/<video_id>_<quality level>_<index>.mp4
//!     <quality label>.partial/      (rendition still encoding)
//! ```
//!
//! Only complete renditions live under their label; a rendition directory
//! appears in one rename once its encode has succeeded.

use std::path::{Path, PathBuf};

use crate::{Quality, VideoId};

/// File name of the extracted thumbnail inside a video root.
pub const THUMBNAIL_FILE: &str = "thumbnail.jpg";

/// Stem of the uploaded source file inside a video root.
pub const ORIGINAL_STEM: &str = "original";

/// Suffix of the directory a rendition is encoded into.
pub const STAGING_SUFFIX: &str = "partial";

/// Extension used for every produced segment.
pub const SEGMENT_EXTENSION: &str = "mp4";

/// Directory holding everything stored for one video.
pub fn video_root(data_dir: &Path, video_id: VideoId) -> PathBuf {
    data_dir.join("videos").join(video_id.to_string())
}

/// Directory holding the segments of one rendition.
pub fn rendition_dir(data_dir: &Path, video_id: VideoId, quality: Quality) -> PathBuf {
    video_root(data_dir, video_id).join(quality.label())
}

/// Directory a rendition is encoded into before it is published.
pub fn staging_dir(data_dir: &Path, video_id: VideoId, quality: Quality) -> PathBuf {
    video_root(data_dir, video_id).join(format!("{}.{STAGING_SUFFIX}", quality.label()))
}

/// Prefix shared by all segment files of one rendition (`<id>_<level>`).
pub fn segment_prefix(video_id: VideoId, quality: Quality) -> String {
    format!("{}_{}", video_id, quality.level())
}

/// File name of one segment.
///
/// # Examples
///
/// ```
/// use vidforge_common::{paths::segment_file_name, Quality, VideoId};
///
/// assert_eq!(segment_file_name(VideoId::new(3), Quality::P240, 0), "3_1_0.mp4");
/// ```
pub fn segment_file_name(video_id: VideoId, quality: Quality, index: u32) -> String {
    format!(
        "{}_{}.{}",
        segment_prefix(video_id, quality),
        index,
        SEGMENT_EXTENSION
    )
}

/// Full path of one segment.
pub fn segment_path(data_dir: &Path, video_id: VideoId, quality: Quality, index: u32) -> PathBuf {
    rendition_dir(data_dir, video_id, quality).join(segment_file_name(video_id, quality, index))
}

/// Path of the thumbnail image.
pub fn thumbnail_path(data_dir: &Path, video_id: VideoId) -> PathBuf {
    video_root(data_dir, video_id).join(THUMBNAIL_FILE)
}

/// Path the uploaded source is stored at, keeping the client's extension.
pub fn original_path(data_dir: &Path, video_id: VideoId, extension: &str) -> PathBuf {
    video_root(data_dir, video_id).join(format!("{ORIGINAL_STEM}.{extension}"))
}

/// Count the segment files a rendition directory holds.
pub fn count_segments(dir: &Path, video_id: VideoId, quality: Quality) -> std::io::Result<u32> {
    let prefix = format!("{}_", segment_prefix(video_id, quality));
    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| {
                name.starts_with(&prefix) && name.ends_with(&format!(".{SEGMENT_EXTENSION}"))
            });
        if matches && path.is_file() {
            count += 1;
        }
    }
    Ok(count)
}

/// Extension to store an upload under, derived from the client's file name.
///
/// Anything that is not a plain alphanumeric extension falls back to `mp4`
/// so a client-supplied name can never escape the video root.
///
/// # Examples
///
/// ```
/// use vidforge_common::paths::upload_extension;
///
/// assert_eq!(upload_extension("/home/me/clip.MOV"), "mov");
/// assert_eq!(upload_extension("clip"), "mp4");
/// assert_eq!(upload_extension("evil./../x"), "mp4");
/// ```
pub fn upload_extension(client_path: &str) -> String {
    Path::new(client_path)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| SEGMENT_EXTENSION.to_string())
}

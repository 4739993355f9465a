//! Video catalog queries.
//!
//! A video is inserted pending at upload start and transitions to ready
//! exactly once through [`finalize_video`]. Listings only ever show ready
//! videos.

use chrono::Utc;
use rusqlite::{Connection, Row};
use vidforge_common::{Error, Result, VideoId};

use super::parse_timestamp;
use crate::models::{Video, VideoSummary, PENDING_LENGTH, PENDING_MARKER};

const VIDEO_COLUMNS: &str = "id, author, title, length, num_segments, max_quality, created_at";

fn video_from_row(row: &Row<'_>) -> rusqlite::Result<Video> {
    Ok(Video {
        id: VideoId::new(row.get(0)?),
        author: row.get(1)?,
        title: row.get(2)?,
        length: row.get(3)?,
        num_segments: row.get(4)?,
        max_quality: row.get(5)?,
        created_at: parse_timestamp(6, &row.get::<_, String>(6)?)?,
    })
}

/// Insert a pending video and return its new id.
pub fn create_pending_video(conn: &Connection, author: &str, title: &str) -> Result<VideoId> {
    conn.execute(
        "INSERT INTO videos (author, title, length, num_segments, max_quality, created_at)
         VALUES (:author, :title, :length, :marker, :marker, :created_at)",
        rusqlite::named_params! {
            ":author": author,
            ":title": title,
            ":length": PENDING_LENGTH,
            ":marker": PENDING_MARKER,
            ":created_at": Utc::now().to_rfc3339(),
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(VideoId::new(conn.last_insert_rowid()))
}

/// Get a video by id, pending or ready.
pub fn get_video(conn: &Connection, id: VideoId) -> Result<Option<Video>> {
    let result = conn.query_row(
        &format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = :id"),
        rusqlite::named_params! { ":id": id.get() },
        video_from_row,
    );

    match result {
        Ok(video) => Ok(Some(video)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Transition a pending video to ready.
///
/// # Errors
///
/// * [`Error::NotFound`] if the video does not exist
/// * [`Error::InvalidInput`] if it was already finalized or the values are
///   not valid for a ready video
pub fn finalize_video(
    conn: &Connection,
    id: VideoId,
    length: f64,
    num_segments: u32,
    max_quality: u8,
) -> Result<()> {
    if !(length > 0.0) || num_segments == 0 {
        return Err(Error::invalid_input(format!(
            "cannot finalize video {id} with length {length} and {num_segments} segments"
        )));
    }

    let rows_affected = conn
        .execute(
            "UPDATE videos
             SET length = :length, num_segments = :num_segments, max_quality = :max_quality
             WHERE id = :id AND length <= 0",
            rusqlite::named_params! {
                ":length": length,
                ":num_segments": num_segments,
                ":max_quality": max_quality,
                ":id": id.get(),
            },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    if rows_affected == 0 {
        return match get_video(conn, id)? {
            None => Err(Error::not_found("video", id)),
            Some(_) => Err(Error::invalid_input(format!(
                "video {id} is already finalized"
            ))),
        };
    }

    Ok(())
}

/// Number of ready videos, optionally for one author.
pub fn count_ready_videos(conn: &Connection, author: Option<&str>) -> Result<u64> {
    conn.query_row(
        "SELECT COUNT(*) FROM videos
         WHERE length > 0 AND (:author IS NULL OR author = :author)",
        rusqlite::named_params! { ":author": author },
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n.max(0) as u64)
    .map_err(|e| Error::database(e.to_string()))
}

/// One slice of ready videos in upload order, optionally for one author.
pub fn list_ready_videos(
    conn: &Connection,
    author: Option<&str>,
    limit: u32,
    offset: u64,
) -> Result<Vec<VideoSummary>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, title, author, length FROM videos
             WHERE length > 0 AND (:author IS NULL OR author = :author)
             ORDER BY id LIMIT :limit OFFSET :offset",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let videos = stmt
        .query_map(
            rusqlite::named_params! {
                ":author": author,
                ":limit": limit,
                ":offset": offset as i64,
            },
            |row| {
                Ok(VideoSummary {
                    id: VideoId::new(row.get(0)?),
                    title: row.get(1)?,
                    author: row.get(2)?,
                    length: row.get(3)?,
                })
            },
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(videos)
}

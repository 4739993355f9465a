//! Typed wire messages.
//!
//! Requests are a closed set discriminated by their `type` field. Decoding
//! goes through [`Request::from_value`] so an unknown `type` is told apart
//! from a known one with bad fields.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use vidforge_common::{Error, Quality, Result, VideoId};
use vidforge_db::models::{Page, UserSummary, Video, VideoSummary};

/// Client to server command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    Login {
        username: String,
        password: String,
    },
    Register {
        username: String,
        password: String,
    },
    Logout,
    Users {
        page_num: u32,
    },
    VideoPage {
        page_num: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        author: Option<String>,
    },
    VideoInfo {
        video_id: VideoId,
    },
    /// Segment fetch.
    Video {
        video_id: VideoId,
        quality: Quality,
        segment_id: u32,
    },
    VideoUpload {
        /// Client-side path of the source; only its extension is used.
        target: String,
        file_size: u64,
        title: String,
    },
}

impl Request {
    const TYPES: [&'static str; 8] = [
        "LOGIN",
        "REGISTER",
        "LOGOUT",
        "USERS",
        "VIDEO_PAGE",
        "VIDEO_INFO",
        "VIDEO",
        "VIDEO_UPLOAD",
    ];

    /// Decode a request from a received frame.
    ///
    /// # Errors
    ///
    /// * [`Error::UnsupportedCommand`] when `type` is missing or unknown
    /// * [`Error::InvalidInput`] when a known command has bad fields
    pub fn from_value(value: Value) -> Result<Self> {
        let kind = match value.get("type").and_then(Value::as_str) {
            Some(kind) if Self::TYPES.contains(&kind) => kind.to_string(),
            Some(kind) => return Err(Error::UnsupportedCommand(kind.to_string())),
            None => return Err(Error::UnsupportedCommand("<missing type>".to_string())),
        };

        serde_json::from_value(value)
            .map_err(|e| Error::invalid_input(format!("bad {kind} request: {e}")))
    }

    /// Wire name of this command, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Login { .. } => "LOGIN",
            Self::Register { .. } => "REGISTER",
            Self::Logout => "LOGOUT",
            Self::Users { .. } => "USERS",
            Self::VideoPage { .. } => "VIDEO_PAGE",
            Self::VideoInfo { .. } => "VIDEO_INFO",
            Self::Video { .. } => "VIDEO",
            Self::VideoUpload { .. } => "VIDEO_UPLOAD",
        }
    }
}

/// Server to client message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Response {
    Users(Page<UserSummary>),
    Videos(Page<VideoSummary>),
    VideoInfo(Video),
    Logout {
        success: bool,
    },
    /// Sent once an upload is stored and its top rendition is ready.
    VideoUpload {
        success: bool,
        video_id: VideoId,
    },
    /// Segment metadata preceding the raw bytes.
    Download {
        target: String,
        file_size: u64,
    },
    /// Go-ahead for a payload transfer, sent by whichever side receives it.
    Ack,
    Error {
        kind: String,
        message: String,
    },
}

impl Response {
    pub fn error(err: &Error) -> Self {
        Self::Error {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }

    /// Decode a message received by a client.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::invalid_input(format!("bad response: {e}")))
    }

    /// Whether `value` is an acknowledgment.
    pub fn is_ack(value: &Value) -> bool {
        value.get("type").and_then(Value::as_str) == Some("ACK")
    }
}

/// Rebuild an error from the `kind` and `message` of an `ERROR` response.
///
/// Variants whose fields cannot be recovered from the message alone come
/// back as [`Error::Internal`]; callers holding the request context map
/// those themselves.
pub fn error_from_wire(kind: &str, message: String) -> Error {
    match kind {
        "InvalidCredentials" => Error::InvalidCredentials,
        "NotAuthenticated" => Error::NotAuthenticated,
        "DuplicateUser" => Error::DuplicateUser(message),
        "EncoderUnavailable" => Error::EncoderUnavailable(message),
        "TransferAborted" => Error::TransferAborted(message),
        "UnsupportedCommand" => Error::UnsupportedCommand(message),
        "InvalidInput" => Error::InvalidInput(message),
        "Database" => Error::Database(message),
        "Probe" => Error::Probe(message),
        _ => Error::Internal(format!("{kind}: {message}")),
    }
}

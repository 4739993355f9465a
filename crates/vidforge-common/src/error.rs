//! Unified error type for vidforge.
//!
//! Every failure a session can report to a client funnels into [`Error`].
//! [`Error::kind`] gives the stable code sent on the wire inside an `ERROR`
//! response, and [`Error::is_fatal`] separates the handful of failures that
//! end a connection from the ones a session recovers from.

/// Unified error type covering all failure modes in vidforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unknown username or wrong password.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Registration attempted with a username that is already taken.
    #[error("Username '{0}' already exists")]
    DuplicateUser(String),

    /// The command requires a logged-in session.
    #[error("Not logged in")]
    NotAuthenticated,

    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "video", "user").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// A segment was requested that was never produced (or not yet).
    #[error("Segment not found: video {video_id}, quality {quality}, index {index}")]
    SegmentNotFound {
        video_id: i64,
        quality: String,
        index: u32,
    },

    /// No usable encoder is installed on this host.
    #[error("Encoder unavailable: {0}")]
    EncoderUnavailable(String),

    /// A binary transfer did not complete as announced.
    #[error("Transfer aborted: {0}")]
    TransferAborted(String),

    /// The request carried a `type` this server does not understand.
    #[error("Command {0} is not supported")]
    UnsupportedCommand(String),

    /// A frame could not be decoded. Ends the session.
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Request data failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An external tool (ffmpeg, ffprobe) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Media probing failed.
    #[error("Probe error: {0}")]
    Probe(String),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new NotFound error.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Create a new Database error.
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new TransferAborted error.
    pub fn transfer_aborted<S: Into<String>>(msg: S) -> Self {
        Self::TransferAborted(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable error code carried in the `kind` field of an `ERROR` response.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "InvalidCredentials",
            Self::DuplicateUser(_) => "DuplicateUser",
            Self::NotAuthenticated => "NotAuthenticated",
            Self::NotFound { .. } => "NotFound",
            Self::SegmentNotFound { .. } => "SegmentNotFound",
            Self::EncoderUnavailable(_) => "EncoderUnavailable",
            Self::TransferAborted(_) => "TransferAborted",
            Self::UnsupportedCommand(_) => "UnsupportedCommand",
            Self::MalformedFrame(_) => "MalformedFrame",
            Self::InvalidInput(_) => "InvalidInput",
            Self::Database(_) => "Database",
            Self::Io(_) => "Io",
            Self::Tool { .. } => "Tool",
            Self::Probe(_) => "Probe",
            Self::Internal(_) => "Internal",
        }
    }

    /// Whether this error means the connection can no longer be used.
    ///
    /// Only a severed transport or an undecodable frame qualify; everything
    /// else is answered with an `ERROR` response and the session continues.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::MalformedFrame(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::not_found("video", 42);
        assert_eq!(err.to_string(), "video not found: 42");

        let err = Error::InvalidCredentials;
        assert_eq!(err.to_string(), "Invalid username or password");

        let err = Error::DuplicateUser("alice".into());
        assert_eq!(err.to_string(), "Username 'alice' already exists");

        let err = Error::UnsupportedCommand("DELETE".into());
        assert_eq!(err.to_string(), "Command DELETE is not supported");
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(Error::NotAuthenticated.kind(), "NotAuthenticated");
        assert_eq!(Error::not_found("video", 1).kind(), "NotFound");
        assert_eq!(
            Error::SegmentNotFound {
                video_id: 1,
                quality: "240p".into(),
                index: 9
            }
            .kind(),
            "SegmentNotFound"
        );
        assert_eq!(
            Error::EncoderUnavailable("ffmpeg".into()).kind(),
            "EncoderUnavailable"
        );
    }

    #[test]
    fn test_fatal_errors() {
        assert!(Error::MalformedFrame("bad length".into()).is_fatal());
        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert!(Error::from(eof).is_fatal());

        assert!(!Error::InvalidCredentials.is_fatal());
        assert!(!Error::UnsupportedCommand("X".into()).is_fatal());
        assert!(!Error::transfer_aborted("short read").is_fatal());
        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(!Error::from(denied).is_fatal());
    }

    #[test]
    fn test_from_json_error() {
        let err = serde_json::from_str::<u32>("nope").unwrap_err();
        assert!(matches!(Error::from(err), Error::InvalidInput(_)));
    }
}

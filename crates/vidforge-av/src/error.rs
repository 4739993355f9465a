//! Error types for vidforge-av.

use std::time::Duration;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving the external media tools.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required external tool is not available.
    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    /// An external tool failed to execute.
    #[error("tool execution failed: {tool}: {message}")]
    ToolFailed { tool: String, message: String },

    /// The tool ran longer than its allotted time.
    #[error("{tool} timed out after {elapsed:?}")]
    Timeout { tool: String, elapsed: Duration },

    /// Failed to parse tool output.
    #[error("failed to parse {tool} output: {message}")]
    ParseError { tool: String, message: String },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Create a tool not found error.
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    /// Create a tool execution failed error.
    pub fn tool_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a parse error.
    pub fn parse_error(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseError {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

impl From<Error> for vidforge_common::Error {
    fn from(err: Error) -> Self {
        use vidforge_common::Error as Common;

        match err {
            Error::ToolNotFound { tool } => {
                Common::EncoderUnavailable(format!("{tool} is not installed"))
            }
            Error::ToolFailed { tool, message } => Common::Tool { tool, message },
            Error::Timeout { tool, elapsed } => Common::Tool {
                tool,
                message: format!("timed out after {elapsed:?}"),
            },
            Error::ParseError { tool, message } => Common::Probe(format!("{tool}: {message}")),
            Error::Json(e) => Common::Probe(e.to_string()),
            Error::Io(e) => Common::Io(e),
            Error::InvalidInput(msg) => Common::InvalidInput(msg),
        }
    }
}

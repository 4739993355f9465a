//! # vidforge-av
//!
//! Thin async wrappers over the ffmpeg command-line tools.
//!
//! - **Tool detection**: [`check_tool`], [`require_tool`] and encoder
//!   selection (hardware encoder where available, `libx264` otherwise)
//! - **Probing**: [`probe::probe_with_ffprobe`] reads frame size, rate and
//!   duration of an upload
//! - **Transcoding**: the [`Transcoder`] trait and its ffmpeg-backed
//!   implementation, which writes fixed-length segments per quality level
//!
//! ```no_run
//! use vidforge_av::{FfmpegOptions, FfmpegTranscoder, Transcoder};
//! use std::path::Path;
//!
//! # async fn example() -> vidforge_av::Result<()> {
//! let transcoder = FfmpegTranscoder::new(FfmpegOptions::default());
//! let encoder = transcoder.check_available()?;
//! let info = transcoder.probe(Path::new("upload.mp4")).await?;
//! println!("{}x{} for {}s via {encoder}", info.width, info.height, info.duration);
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod error;
pub mod probe;
pub mod tools;
pub mod transcode;

pub use command::{ToolCommand, ToolOutput};
pub use error::{Error, Result};
pub use probe::SourceInfo;
pub use tools::{check_tool, check_tools, require_tool, EncoderPreference, ToolInfo};
pub use transcode::{EncodeJob, FfmpegOptions, FfmpegTranscoder, Transcoder};

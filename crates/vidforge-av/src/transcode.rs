//! The encode capability behind the transcoding pipeline.
//!
//! [`Transcoder`] is the seam between the pipeline and ffmpeg: it probes a
//! source, encodes one rendition into fixed-length segments, and grabs a
//! thumbnail frame. [`FfmpegTranscoder`] is the real implementation; tests
//! substitute their own.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use vidforge_common::{paths, Quality};

use crate::command::ToolCommand;
use crate::probe::{probe_with_ffprobe, SourceInfo};
use crate::tools::{get_tool_path, select_encoder, EncoderPreference};
use crate::{Error, Result};

/// One rendition to produce.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeJob {
    /// Source file to encode.
    pub source: PathBuf,
    /// Directory the segment files are written into.
    pub output_dir: PathBuf,
    /// File name prefix; segments are `<prefix>_<n>.mp4`.
    pub prefix: String,
    pub quality: Quality,
    /// Nominal segment length in seconds.
    pub segment_duration: f64,
}

/// Probe, encode and thumbnail operations the pipeline needs.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Check that encoding can happen at all on this host.
    ///
    /// Returns the name of the encoder that will be used.
    fn check_available(&self) -> Result<String>;

    /// Read the properties of a source file.
    async fn probe(&self, source: &Path) -> Result<SourceInfo>;

    /// Encode and segment one rendition.
    async fn encode(&self, job: &EncodeJob) -> Result<()>;

    /// Write a single frame taken `at_secs` into `source` to `output`.
    async fn thumbnail(&self, source: &Path, at_secs: f64, output: &Path) -> Result<()>;
}

/// Options for [`FfmpegTranscoder`].
#[derive(Debug, Clone)]
pub struct FfmpegOptions {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    pub encoder: EncoderPreference,
    /// Upper bound on a single rendition encode.
    pub encode_timeout: Duration,
    /// Upper bound on probe and thumbnail invocations.
    pub probe_timeout: Duration,
}

impl Default for FfmpegOptions {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            encoder: EncoderPreference::Auto,
            encode_timeout: Duration::from_secs(3600),
            probe_timeout: Duration::from_secs(30),
        }
    }
}

/// [`Transcoder`] backed by the ffmpeg and ffprobe command-line tools.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    options: FfmpegOptions,
}

impl FfmpegTranscoder {
    pub fn new(options: FfmpegOptions) -> Self {
        Self { options }
    }

    fn ffmpeg(&self) -> Result<PathBuf> {
        get_tool_path("ffmpeg", self.options.ffmpeg_path.as_deref())
    }

    fn ffprobe(&self) -> Result<PathBuf> {
        get_tool_path("ffprobe", self.options.ffprobe_path.as_deref())
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn check_available(&self) -> Result<String> {
        let ffmpeg = self.ffmpeg()?;
        self.ffprobe()?;
        Ok(select_encoder(&ffmpeg, &self.options.encoder))
    }

    async fn probe(&self, source: &Path) -> Result<SourceInfo> {
        let ffprobe = self.ffprobe()?;
        probe_with_ffprobe(&ffprobe, source, self.options.probe_timeout).await
    }

    async fn encode(&self, job: &EncodeJob) -> Result<()> {
        let encoder = self.check_available()?;
        let ffmpeg = self.ffmpeg()?;

        tracing::debug!(
            source = %job.source.display(),
            quality = %job.quality,
            encoder = %encoder,
            "Encoding rendition"
        );

        ToolCommand::new(ffmpeg)
            .args(segment_args(job, &encoder))
            .timeout(self.options.encode_timeout)
            .execute()
            .await?;

        Ok(())
    }

    async fn thumbnail(&self, source: &Path, at_secs: f64, output: &Path) -> Result<()> {
        if !(at_secs >= 0.0) || !at_secs.is_finite() {
            return Err(Error::InvalidInput(format!(
                "thumbnail position {at_secs} is not a valid time"
            )));
        }

        let ffmpeg = self.ffmpeg()?;
        ToolCommand::new(ffmpeg)
            .args(thumbnail_args(source, at_secs, output))
            .timeout(self.options.probe_timeout)
            .execute()
            .await?;

        Ok(())
    }
}

/// ffmpeg arguments that scale, encode and split `job.source` into
/// `job.output_dir/<prefix>_<n>.mp4`.
pub fn segment_args(job: &EncodeJob, encoder: &str) -> Vec<String> {
    let profile = job.quality.encoding();
    let pattern = job
        .output_dir
        .join(format!("{}_%d.{}", job.prefix, paths::SEGMENT_EXTENSION));

    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-y".into(),
        "-i".into(),
        job.source.to_string_lossy().into_owned(),
        "-c:v".into(),
        encoder.into(),
    ];

    // VideoToolbox takes neither -preset nor -crf.
    if encoder == crate::tools::SOFTWARE_ENCODER {
        args.extend([
            "-preset".into(),
            profile.preset.into(),
            "-crf".into(),
            profile.crf.to_string(),
        ]);
    } else {
        args.extend(["-b:v".into(), profile.video_bitrate.into()]);
    }

    args.extend([
        "-maxrate".into(),
        profile.video_bitrate.into(),
        "-bufsize".into(),
        profile.video_bitrate.into(),
        "-vf".into(),
        format!("scale=-2:{}", profile.height),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        profile.audio_bitrate.into(),
        "-movflags".into(),
        "+faststart".into(),
        "-f".into(),
        "segment".into(),
        "-segment_time".into(),
        job.segment_duration.to_string(),
        "-reset_timestamps".into(),
        "1".into(),
        pattern.to_string_lossy().into_owned(),
    ]);

    args
}

/// ffmpeg arguments that write one frame at `at_secs`.
pub fn thumbnail_args(source: &Path, at_secs: f64, output: &Path) -> Vec<String> {
    vec![
        "-hide_banner".into(),
        "-y".into(),
        "-ss".into(),
        format!("{at_secs:.3}"),
        "-i".into(),
        source.to_string_lossy().into_owned(),
        "-vframes".into(),
        "1".into(),
        "-q:v".into(),
        "2".into(),
        output.to_string_lossy().into_owned(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(quality: Quality) -> EncodeJob {
        EncodeJob {
            source: PathBuf::from("/data/videos/7/original.mp4"),
            output_dir: PathBuf::from("/data/videos/7/240p"),
            prefix: "7_1".into(),
            quality,
            segment_duration: 3.0,
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_segment_args_software() {
        let args = segment_args(&job(Quality::P240), "libx264");

        assert_eq!(value_after(&args, "-c:v"), Some("libx264"));
        assert_eq!(value_after(&args, "-crf"), Some("23"));
        assert_eq!(value_after(&args, "-preset"), Some("slow"));
        assert_eq!(value_after(&args, "-maxrate"), Some("300k"));
        assert_eq!(value_after(&args, "-vf"), Some("scale=-2:240"));
        assert_eq!(value_after(&args, "-b:a"), Some("128k"));
        assert_eq!(value_after(&args, "-f"), Some("segment"));
        assert_eq!(value_after(&args, "-segment_time"), Some("3"));
        assert!(args
            .last()
            .is_some_and(|out| out.ends_with("240p/7_1_%d.mp4")));
    }

    #[test]
    fn test_segment_args_hardware_skips_crf() {
        let args = segment_args(&job(Quality::P1080), "h264_videotoolbox");

        assert_eq!(value_after(&args, "-c:v"), Some("h264_videotoolbox"));
        assert!(!args.iter().any(|a| a == "-crf"));
        assert_eq!(value_after(&args, "-b:v"), Some("5000k"));
    }

    #[test]
    fn test_thumbnail_args() {
        let args = thumbnail_args(Path::new("in.mp4"), 3.0, Path::new("thumbnail.jpg"));
        assert_eq!(value_after(&args, "-ss"), Some("3.000"));
        assert_eq!(value_after(&args, "-vframes"), Some("1"));
        assert_eq!(args.last().map(String::as_str), Some("thumbnail.jpg"));
    }

    #[tokio::test]
    async fn test_thumbnail_rejects_negative_time() {
        let transcoder = FfmpegTranscoder::new(FfmpegOptions::default());
        let result = transcoder
            .thumbnail(Path::new("in.mp4"), -1.0, Path::new("out.jpg"))
            .await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}

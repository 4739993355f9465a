//! Transcoding pipeline.
//!
//! Turns a stored upload into a ladder of segmented renditions plus a
//! thumbnail. Rendition encodes share a bounded pool of worker permits.
//! The caller waits only for the highest rendition, which finalizes the
//! catalog entry; the rest finish in the background and a failure there
//! only means that rendition is missing.
//!
//! Each rendition is encoded into a staging directory and renamed into
//! place only after the encoder succeeds, so sessions never see segments
//! of a rendition that is still running or that failed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use vidforge_av::{EncodeJob, SourceInfo, Transcoder};
use vidforge_common::{paths, Error, Quality, Result, VideoId};

use crate::config::PipelineConfig;
use crate::store::CatalogStore;

/// Tunables for [`Pipeline`].
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    /// Rendition encodes allowed to run at once.
    pub workers: usize,
    /// Nominal segment length in seconds.
    pub segment_duration: f64,
    /// Fraction of the duration where the thumbnail is taken, in `[0, 1]`.
    pub thumbnail_position: f64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for PipelineOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            workers: config.workers.max(1),
            segment_duration: config.segment_duration_secs,
            thumbnail_position: config.thumbnail_position.clamp(0.0, 1.0),
        }
    }
}

/// Outcome of [`Pipeline::process`].
#[derive(Debug)]
pub struct ProcessedVideo {
    pub video_id: VideoId,
    pub source: SourceInfo,
    /// Every rendition planned, lowest first.
    pub ladder: Vec<Quality>,
    /// The rendition the video was finalized with.
    pub max_quality: Quality,
    pub num_segments: u32,
    background: Vec<JoinHandle<()>>,
}

impl ProcessedVideo {
    /// Wait for the thumbnail and the lower renditions to settle.
    pub async fn join_background(self) {
        for handle in self.background {
            if let Err(e) = handle.await {
                tracing::warn!(video_id = %self.video_id, "Background job panicked: {}", e);
            }
        }
    }
}

/// Runs uploads through the [`Transcoder`].
#[derive(Clone)]
pub struct Pipeline {
    transcoder: Arc<dyn Transcoder>,
    catalog: CatalogStore,
    data_dir: PathBuf,
    options: PipelineOptions,
    workers: Arc<Semaphore>,
}

impl Pipeline {
    pub fn new(
        transcoder: Arc<dyn Transcoder>,
        catalog: CatalogStore,
        data_dir: impl Into<PathBuf>,
        options: PipelineOptions,
    ) -> Self {
        let workers = Arc::new(Semaphore::new(options.workers.max(1)));
        Self {
            transcoder,
            catalog,
            data_dir: data_dir.into(),
            options,
            workers,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn segment_duration(&self) -> f64 {
        self.options.segment_duration
    }

    /// Confirm an encoder exists before an upload is accepted.
    ///
    /// Returns the encoder name.
    pub fn check_encoder(&self) -> Result<String> {
        self.transcoder.check_available().map_err(|e| match e {
            vidforge_av::Error::ToolNotFound { tool } => {
                Error::EncoderUnavailable(format!("{tool} is not installed"))
            }
            other => Error::EncoderUnavailable(other.to_string()),
        })
    }

    /// Transcode a stored upload and finalize its catalog entry.
    ///
    /// Returns once the highest rendition is encoded and the video is
    /// marked ready. The thumbnail and lower renditions keep running.
    pub async fn process(&self, video_id: VideoId, source: &Path) -> Result<ProcessedVideo> {
        let encoder = self.check_encoder()?;

        let info = self.transcoder.probe(source).await.map_err(Error::from)?;
        let ladder = Quality::ladder_for_height(info.height);
        let top = ladder.last().copied().unwrap_or(Quality::LOWEST);

        tracing::info!(
            video_id = %video_id,
            width = info.width,
            height = info.height,
            duration = info.duration,
            encoder = %encoder,
            ladder = ?ladder,
            "Processing upload"
        );

        let mut background = vec![self.spawn_thumbnail(video_id, source, info.duration)];

        // The top rendition holds its permit before any lower one is queued.
        let top_permit = Arc::clone(&self.workers)
            .acquire_owned()
            .await
            .map_err(|e| Error::internal(format!("worker pool closed: {e}")))?;
        let top_job = self.spawn_rendition(video_id, source, top, Some(top_permit));
        for &quality in ladder.iter().rev().skip(1) {
            let job = self.spawn_rendition(video_id, source, quality, None);
            background.push(tokio::spawn(async move {
                let _ = job.await;
            }));
        }

        let num_segments = top_job
            .await
            .map_err(|e| Error::internal(format!("rendition task failed: {e}")))??;

        if num_segments == 0 {
            return Err(Error::Tool {
                tool: "ffmpeg".into(),
                message: format!("{top} rendition produced no segments"),
            });
        }

        self.catalog
            .finalize_video(video_id, info.duration, num_segments, top)?;

        Ok(ProcessedVideo {
            video_id,
            source: info,
            ladder,
            max_quality: top,
            num_segments,
            background,
        })
    }

    fn spawn_rendition(
        &self,
        video_id: VideoId,
        source: &Path,
        quality: Quality,
        permit: Option<OwnedSemaphorePermit>,
    ) -> JoinHandle<Result<u32>> {
        let transcoder = Arc::clone(&self.transcoder);
        let workers = Arc::clone(&self.workers);
        let rendition_dir = paths::rendition_dir(&self.data_dir, video_id, quality);
        let job = EncodeJob {
            source: source.to_path_buf(),
            output_dir: paths::staging_dir(&self.data_dir, video_id, quality),
            prefix: paths::segment_prefix(video_id, quality),
            quality,
            segment_duration: self.options.segment_duration,
        };

        tokio::spawn(async move {
            let result = encode_rendition(
                transcoder.as_ref(),
                workers,
                permit,
                &job,
                &rendition_dir,
                video_id,
            )
            .await;
            match &result {
                Ok(count) => tracing::info!(
                    video_id = %video_id,
                    quality = %quality,
                    segments = count,
                    "Rendition ready"
                ),
                Err(e) => tracing::warn!(
                    video_id = %video_id,
                    quality = %quality,
                    "Rendition failed: {}",
                    e
                ),
            }
            result
        })
    }

    fn spawn_thumbnail(&self, video_id: VideoId, source: &Path, duration: f64) -> JoinHandle<()> {
        let transcoder = Arc::clone(&self.transcoder);
        let source = source.to_path_buf();
        let output = paths::thumbnail_path(&self.data_dir, video_id);
        let at = duration * self.options.thumbnail_position;

        tokio::spawn(async move {
            if duration <= 0.0 {
                tracing::warn!(video_id = %video_id, "Skipping thumbnail: invalid duration");
                return;
            }
            match transcoder.thumbnail(&source, at, &output).await {
                Ok(()) => tracing::debug!(video_id = %video_id, "Thumbnail written"),
                Err(e) => tracing::warn!(video_id = %video_id, "Thumbnail failed: {}", e),
            }
        })
    }
}

/// Encode one rendition into its staging directory and publish it.
///
/// `permit` is a worker permit the caller already holds; without one the
/// job queues on `workers`.
async fn encode_rendition(
    transcoder: &dyn Transcoder,
    workers: Arc<Semaphore>,
    permit: Option<OwnedSemaphorePermit>,
    job: &EncodeJob,
    rendition_dir: &Path,
    video_id: VideoId,
) -> Result<u32> {
    let _permit = match permit {
        Some(permit) => permit,
        None => workers
            .acquire_owned()
            .await
            .map_err(|e| Error::internal(format!("worker pool closed: {e}")))?,
    };

    if tokio::fs::try_exists(&job.output_dir).await? {
        tokio::fs::remove_dir_all(&job.output_dir).await?;
    }
    tokio::fs::create_dir_all(&job.output_dir).await?;

    if let Err(e) = transcoder.encode(job).await {
        if let Err(cleanup) = tokio::fs::remove_dir_all(&job.output_dir).await {
            tracing::debug!(video_id = %video_id, "Failed to remove staging directory: {}", cleanup);
        }
        return Err(Error::from(e));
    }

    let count = paths::count_segments(&job.output_dir, video_id, job.quality)?;
    tokio::fs::rename(&job.output_dir, rendition_dir).await?;
    Ok(count)
}

//! Playback scheduler.
//!
//! A prefetch worker pulls segments in order from a [`SegmentSource`] and
//! publishes which ones are available locally. The playing side talks to
//! it only through channels: seeks and quality changes go in as commands,
//! availability and failures come out over a `watch` channel, and
//! [`PlaybackEvent`]s report what happened along the way. Events are
//! advisory: when nobody drains them the worker drops new ones rather than
//! wait. Cancelling the token stops the worker before it issues another
//! request.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use vidforge_common::{Error, Quality, Result, VideoId};
use vidforge_db::models::Video;

const COMMAND_CAPACITY: usize = 16;
const EVENT_CAPACITY: usize = 64;

/// Where segments come from.
#[async_trait]
pub trait SegmentSource: Send {
    /// Make one segment available locally and return its path.
    ///
    /// Fails with [`Error::SegmentNotFound`] when the server never produced
    /// the segment.
    async fn fetch(&mut self, video_id: VideoId, quality: Quality, index: u32) -> Result<PathBuf>;
}

/// Fixed facts about the video being played.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackPlan {
    pub video_id: VideoId,
    /// Total duration in seconds.
    pub length: f64,
    pub num_segments: u32,
    pub segment_duration: f64,
    /// Quality playback starts at.
    pub quality: Quality,
}

impl PlaybackPlan {
    /// Plan playback of a ready video at its top quality.
    pub fn for_video(video: &Video, segment_duration: f64) -> Result<Self> {
        let (Some(quality), Some(num_segments)) = (video.top_quality(), video.segment_count())
        else {
            return Err(Error::invalid_input(format!(
                "video {} is not ready for playback",
                video.id
            )));
        };
        if !(segment_duration > 0.0) {
            return Err(Error::invalid_input("segment duration must be positive"));
        }

        Ok(Self {
            video_id: video.id,
            length: video.length,
            num_segments,
            segment_duration,
            quality,
        })
    }

    pub fn last_index(&self) -> u32 {
        self.num_segments.saturating_sub(1)
    }

    /// Playing time of one segment. The last one holds the remainder.
    pub fn segment_length(&self, index: u32) -> Duration {
        let start = f64::from(index) * self.segment_duration;
        let secs = if index >= self.last_index() {
            (self.length - start).clamp(0.0, self.segment_duration)
        } else {
            self.segment_duration
        };
        Duration::from_secs_f64(secs)
    }
}

/// Segment index and in-segment offset for a seek to `desired_time`.
///
/// Times past the last segment clamp to its start, with offset zero.
pub fn seek_target(desired_time: f64, segment_duration: f64, last_index: u32) -> (u32, f64) {
    let desired = desired_time.max(0.0);
    let index = (desired / segment_duration).floor();
    if index > f64::from(last_index) {
        return (last_index, 0.0);
    }
    (index as u32, desired % segment_duration)
}

/// A segment present on local storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Available {
    pub index: u32,
    pub quality: Quality,
    pub path: PathBuf,
}

/// A segment the worker gave up on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    /// Lowest quality tried.
    pub quality: Quality,
    pub message: String,
}

/// Everything fetched so far, by segment index, plus the segments that
/// could not be fetched at any quality.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Availability {
    segments: BTreeMap<u32, Available>,
    failed: BTreeMap<u32, FetchFailure>,
}

impl Availability {
    pub fn failure(&self, index: u32) -> Option<&FetchFailure> {
        self.failed.get(&index)
    }

    pub fn get(&self, index: u32) -> Option<&Available> {
        self.segments.get(&index)
    }

    pub fn contains(&self, index: u32) -> bool {
        self.segments.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Something the player should react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// The quality was unavailable; playback continues one step lower.
    QualityFallback {
        index: u32,
        from: Quality,
        to: Quality,
    },
    /// A segment could not be fetched at any quality.
    Failed {
        index: u32,
        quality: Quality,
        kind: &'static str,
        message: String,
    },
    /// Every segment through the last one is available.
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    Seek { index: u32 },
    SetQuality(Quality),
}

/// Result of [`PlaybackScheduler::seek`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekTarget {
    pub index: u32,
    /// Seconds into the target segment.
    pub offset: f64,
}

/// Handle to a running prefetch worker.
///
/// Dropping the handle cancels the worker.
pub struct PlaybackScheduler {
    plan: PlaybackPlan,
    commands: mpsc::Sender<Command>,
    availability: watch::Receiver<Availability>,
    events: mpsc::Receiver<PlaybackEvent>,
    cancel: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl PlaybackScheduler {
    /// Spawn the prefetch worker, starting at `start_index`.
    pub fn start<S>(source: S, plan: PlaybackPlan, start_index: u32, cancel: &CancellationToken) -> Self
    where
        S: SegmentSource + 'static,
    {
        let cancel = cancel.child_token();
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);
        let (availability_tx, availability_rx) = watch::channel(Availability::default());

        let worker = PrefetchWorker {
            source,
            video_id: plan.video_id,
            last_index: plan.last_index(),
            next_index: Some(start_index.min(plan.last_index())),
            quality: plan.quality,
            in_flight: None,
            commands: command_rx,
            availability: availability_tx,
            events: event_tx,
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(worker.run());

        Self {
            plan,
            commands: command_tx,
            availability: availability_rx,
            events: event_rx,
            cancel,
            worker: Some(handle),
        }
    }

    pub fn plan(&self) -> &PlaybackPlan {
        &self.plan
    }

    /// A receiver that sees every availability update.
    pub fn subscribe(&self) -> watch::Receiver<Availability> {
        self.availability.clone()
    }

    pub fn is_available(&self, index: u32) -> bool {
        self.availability.borrow().contains(index)
    }

    /// Redirect prefetching to the segment holding `desired_time`.
    pub async fn seek(&self, desired_time: f64) -> Result<SeekTarget> {
        let (index, offset) = seek_target(
            desired_time,
            self.plan.segment_duration,
            self.plan.last_index(),
        );
        self.send(Command::Seek { index }).await?;
        Ok(SeekTarget { index, offset })
    }

    /// Fetch subsequent segments at `quality`.
    pub async fn set_quality(&self, quality: Quality) -> Result<()> {
        self.send(Command::SetQuality(quality)).await
    }

    /// Next event from the worker, or `None` once it has exited.
    ///
    /// Events that arrive while the queue is full are dropped.
    pub async fn next_event(&mut self) -> Option<PlaybackEvent> {
        self.events.recv().await
    }

    /// Wait until segment `index` is available.
    ///
    /// Fails when the worker gives up on that segment or stops before it
    /// arrives.
    pub async fn wait_for(&mut self, index: u32) -> Result<Available> {
        loop {
            {
                let state = self.availability.borrow_and_update();
                if let Some(available) = state.get(index) {
                    return Ok(available.clone());
                }
                if let Some(failure) = state.failure(index) {
                    return Err(Error::internal(format!(
                        "segment {index} unavailable at {}: {}",
                        failure.quality, failure.message
                    )));
                }
            }

            if self.availability.changed().await.is_err() {
                return Err(Error::internal("prefetch worker stopped"));
            }
        }
    }

    /// Signal the worker to stop. It issues no further requests.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel the worker and wait for it to exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.worker.take() {
            if let Err(e) = handle.await {
                tracing::warn!("Prefetch worker panicked: {}", e);
            }
        }
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::internal("prefetch worker stopped"))
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct PrefetchWorker<S> {
    source: S,
    video_id: VideoId,
    last_index: u32,
    /// Next segment to request, `None` when there is nothing left to do.
    next_index: Option<u32>,
    quality: Quality,
    /// Segment currently being requested.
    in_flight: Option<(Quality, u32)>,
    commands: mpsc::Receiver<Command>,
    availability: watch::Sender<Availability>,
    events: mpsc::Sender<PlaybackEvent>,
    cancel: CancellationToken,
}

impl<S: SegmentSource> PrefetchWorker<S> {
    async fn run(mut self) {
        debug!(video_id = %self.video_id, "Prefetch worker started");

        loop {
            if self.cancel.is_cancelled() {
                debug!(video_id = %self.video_id, "Prefetch worker cancelled");
                return;
            }

            while let Ok(command) = self.commands.try_recv() {
                self.apply(command);
            }

            let Some(index) = self.next_index else {
                // Idle until a seek or quality change gives it work.
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => {
                        debug!(video_id = %self.video_id, "Prefetch worker cancelled while idle");
                        return;
                    }
                    command = self.commands.recv() => match command {
                        Some(command) => self.apply(command),
                        None => return,
                    },
                }
                continue;
            };

            let quality = self.quality;
            self.in_flight = Some((quality, index));
            let mut deferred = Vec::new();

            let result = {
                let fetch = self.source.fetch(self.video_id, quality, index);
                tokio::pin!(fetch);
                loop {
                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => {
                            debug!(video_id = %self.video_id, segment = index, "Prefetch worker cancelled during fetch");
                            return;
                        }
                        result = &mut fetch => break result,
                        Some(command) = self.commands.recv() => {
                            // The in-flight request runs to completion; a seek
                            // elsewhere only changes what follows it.
                            match command {
                                Command::Seek { index: target } if self.in_flight == Some((quality, target)) => {
                                    deferred.retain(|c| !matches!(c, Command::Seek { .. }));
                                }
                                other => deferred.push(other),
                            }
                        }
                    }
                }
            };
            self.in_flight = None;

            match result {
                Ok(path) => {
                    self.publish(Available {
                        index,
                        quality,
                        path,
                    });
                    self.next_index = (index < self.last_index).then_some(index + 1);
                    if self.next_index.is_none() {
                        self.emit(PlaybackEvent::Complete);
                    }
                }
                Err(e) => {
                    if !self.on_fetch_error(index, quality, e) {
                        return;
                    }
                }
            }

            for command in deferred {
                self.apply(command);
            }
        }
    }

    /// Step down a quality or report the failure. Returns `false` when the
    /// worker should exit.
    fn on_fetch_error(&mut self, index: u32, quality: Quality, err: Error) -> bool {
        if let (Error::SegmentNotFound { .. }, Some(lower)) = (&err, quality.lower()) {
            debug!(video_id = %self.video_id, segment = index, from = %quality, to = %lower, "Falling back");
            self.quality = lower;
            self.emit(PlaybackEvent::QualityFallback {
                index,
                from: quality,
                to: lower,
            });
            return true;
        }

        tracing::warn!(
            video_id = %self.video_id,
            quality = %quality,
            segment = index,
            "Segment fetch failed: {}",
            err
        );
        self.next_index = None;
        self.availability.send_modify(|state| {
            state.failed.insert(
                index,
                FetchFailure {
                    quality,
                    message: err.to_string(),
                },
            );
        });
        self.emit(PlaybackEvent::Failed {
            index,
            quality,
            kind: err.kind(),
            message: err.to_string(),
        });
        !err.is_fatal()
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Seek { index } => {
                let index = index.min(self.last_index);
                debug!(video_id = %self.video_id, segment = index, "Seek");
                self.next_index = Some(index);
            }
            Command::SetQuality(quality) => {
                debug!(video_id = %self.video_id, quality = %quality, "Quality change");
                self.quality = quality;
                if self.next_index.is_none() {
                    // Refill from the segment after the newest one at this quality.
                    let resume = self
                        .availability
                        .borrow()
                        .segments
                        .values()
                        .filter(|a| a.quality == quality)
                        .map(|a| a.index + 1)
                        .max()
                        .unwrap_or(0);
                    self.next_index = (resume <= self.last_index).then_some(resume);
                }
            }
        }
    }

    fn publish(&self, available: Available) {
        self.availability.send_modify(|state| {
            state.failed.remove(&available.index);
            state.segments.insert(available.index, available);
        });
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Err(mpsc::error::TrySendError::Full(event)) = self.events.try_send(event) {
            debug!(video_id = %self.video_id, ?event, "Event queue full, dropping event");
        }
    }
}

/// One loaded player buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedSegment {
    pub index: u32,
    pub path: PathBuf,
    /// Seconds into the segment where playback begins.
    pub offset: f64,
}

/// Two alternating player buffers.
///
/// The active buffer plays the current segment while the idle one holds
/// the next. At the projected end of the current segment the two swap.
/// All timing comes from the `Instant`s passed in.
#[derive(Debug, Default)]
pub struct BufferPair {
    buffers: [Option<LoadedSegment>; 2],
    active: usize,
    started_at: Option<Instant>,
}

impl BufferPair {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&LoadedSegment> {
        self.buffers[self.active].as_ref()
    }

    pub fn idle(&self) -> Option<&LoadedSegment> {
        self.buffers[1 - self.active].as_ref()
    }

    /// Index of the segment playing now.
    pub fn current_index(&self) -> Option<u32> {
        self.active().map(|s| s.index)
    }

    /// Preload the idle buffer.
    pub fn load_idle(&mut self, available: &Available, offset: f64) {
        self.buffers[1 - self.active] = Some(LoadedSegment {
            index: available.index,
            path: available.path.clone(),
            offset,
        });
    }

    /// Make the idle buffer active and start it at `now`.
    ///
    /// Returns the index now playing, or `None` if the idle buffer is empty.
    pub fn swap(&mut self, now: Instant) -> Option<u32> {
        let idle = 1 - self.active;
        self.buffers[idle].as_ref()?;
        self.buffers[self.active] = None;
        self.active = idle;
        self.started_at = Some(now);
        self.current_index()
    }

    /// When the active segment finishes playing.
    pub fn projected_end(&self, plan: &PlaybackPlan) -> Option<Instant> {
        let active = self.active()?;
        let started = self.started_at?;
        let remaining = plan
            .segment_length(active.index)
            .saturating_sub(Duration::from_secs_f64(active.offset.max(0.0)));
        Some(started + remaining)
    }

    /// Whether the whole video has played through at `now`.
    pub fn finished(&self, plan: &PlaybackPlan, now: Instant) -> bool {
        match (self.current_index(), self.projected_end(plan)) {
            (Some(index), Some(end)) => index >= plan.last_index() && now >= end,
            _ => false,
        }
    }

    /// Advance playback to `now`.
    ///
    /// Swaps when the active segment has ended and the idle buffer holds
    /// the one after it, returning the new index. The swap is anchored at
    /// the projected end rather than `now` so late ticks do not drift.
    pub fn tick(&mut self, plan: &PlaybackPlan, now: Instant) -> Option<u32> {
        let end = self.projected_end(plan)?;
        if now < end {
            return None;
        }
        let current = self.current_index()?;
        if self.idle().map(|s| s.index) != Some(current + 1) {
            return None;
        }
        self.swap(end)
    }

    /// Jump to a segment that is already available.
    pub fn seek(&mut self, available: &Available, offset: f64, now: Instant) -> Option<u32> {
        self.load_idle(available, offset);
        self.swap(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn plan(length: f64, num_segments: u32) -> PlaybackPlan {
        PlaybackPlan {
            video_id: VideoId::new(1),
            length,
            num_segments,
            segment_duration: 3.0,
            quality: Quality::P240,
        }
    }

    /// Serves any segment present in `have`, logging each request.
    #[derive(Clone, Default)]
    struct FakeSource {
        have: Arc<HashSet<(Quality, u32)>>,
        requests: Arc<Mutex<Vec<(Quality, u32)>>>,
        delay: Duration,
    }

    impl FakeSource {
        fn with(have: impl IntoIterator<Item = (Quality, u32)>, delay: Duration) -> Self {
            Self {
                have: Arc::new(have.into_iter().collect()),
                requests: Arc::default(),
                delay,
            }
        }

        fn requests(&self) -> Vec<(Quality, u32)> {
            self.requests.lock().clone()
        }
    }

    #[async_trait]
    impl SegmentSource for FakeSource {
        async fn fetch(&mut self, video_id: VideoId, quality: Quality, index: u32) -> Result<PathBuf> {
            self.requests.lock().push((quality, index));
            tokio::time::sleep(self.delay).await;
            if self.have.contains(&(quality, index)) {
                Ok(PathBuf::from(format!("{}_{}_{}.mp4", video_id, quality.level(), index)))
            } else {
                Err(Error::SegmentNotFound {
                    video_id: video_id.get(),
                    quality: quality.label().to_string(),
                    index,
                })
            }
        }
    }

    #[test]
    fn test_seek_target() {
        assert_eq!(seek_target(8.0, 3.0, 3), (2, 2.0));
        assert_eq!(seek_target(0.0, 3.0, 3), (0, 0.0));
        assert_eq!(seek_target(9.5, 3.0, 3), (3, 0.5));
        assert_eq!(seek_target(30.0, 3.0, 3), (3, 0.0));
        assert_eq!(seek_target(-4.0, 3.0, 3), (0, 0.0));
    }

    #[test]
    fn test_segment_length_remainder() {
        let plan = plan(11.0, 4);
        assert_eq!(plan.segment_length(0), Duration::from_secs(3));
        assert_eq!(plan.segment_length(3), Duration::from_secs(2));
    }

    #[test]
    fn test_plan_for_pending_video() {
        let video = Video {
            id: VideoId::new(1),
            author: "alice".into(),
            title: "clip".into(),
            length: -1.0,
            num_segments: -1,
            max_quality: -1,
            created_at: Utc::now(),
        };
        assert!(PlaybackPlan::for_video(&video, 3.0).is_err());

        let ready = Video {
            length: 11.0,
            num_segments: 4,
            max_quality: 1,
            ..video
        };
        let plan = PlaybackPlan::for_video(&ready, 3.0).unwrap();
        assert_eq!(plan.quality, Quality::P240);
        assert_eq!(plan.last_index(), 3);
    }

    #[tokio::test]
    async fn test_prefetches_in_order() {
        let source = FakeSource::with((0..4).map(|i| (Quality::P240, i)), Duration::ZERO);
        let cancel = CancellationToken::new();
        let mut scheduler = PlaybackScheduler::start(source.clone(), plan(11.0, 4), 0, &cancel);

        assert_eq!(scheduler.next_event().await, Some(PlaybackEvent::Complete));
        let last = scheduler.wait_for(3).await.unwrap();
        assert_eq!(last.quality, Quality::P240);
        assert_eq!(
            source.requests(),
            (0..4).map(|i| (Quality::P240, i)).collect::<Vec<_>>()
        );
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_falls_back_to_lower_quality() {
        let source = FakeSource::with((0..2).map(|i| (Quality::P144, i)), Duration::ZERO);
        let cancel = CancellationToken::new();
        let mut scheduler = PlaybackScheduler::start(source, plan(6.0, 2), 0, &cancel);

        assert_eq!(
            scheduler.next_event().await,
            Some(PlaybackEvent::QualityFallback {
                index: 0,
                from: Quality::P240,
                to: Quality::P144,
            })
        );
        let seg = scheduler.wait_for(1).await.unwrap();
        assert_eq!(seg.quality, Quality::P144);
    }

    #[tokio::test]
    async fn test_reports_failure_when_no_lower_quality() {
        let source = FakeSource::with([], Duration::ZERO);
        let cancel = CancellationToken::new();
        let mut scheduler = PlaybackScheduler::start(source, plan(6.0, 2), 0, &cancel);

        let err = scheduler.wait_for(0).await.unwrap_err();
        assert!(err.to_string().contains("segment 0 unavailable"));
    }

    #[tokio::test]
    async fn test_seek_before_first_fetch() {
        let source = FakeSource::with((0..4).map(|i| (Quality::P240, i)), Duration::ZERO);
        let cancel = CancellationToken::new();
        let mut scheduler = PlaybackScheduler::start(source.clone(), plan(11.0, 4), 0, &cancel);

        let target = scheduler.seek(8.0).await.unwrap();
        assert_eq!(target, SeekTarget { index: 2, offset: 2.0 });

        scheduler.wait_for(3).await.unwrap();
        assert_eq!(
            source.requests(),
            vec![(Quality::P240, 2), (Quality::P240, 3)]
        );
    }

    #[tokio::test]
    async fn test_seek_during_fetch_continues_at_target() {
        let source = FakeSource::with(
            (0..100).map(|i| (Quality::P240, i)),
            Duration::from_millis(20),
        );
        let cancel = CancellationToken::new();
        let mut scheduler = PlaybackScheduler::start(source.clone(), plan(300.0, 100), 0, &cancel);

        scheduler.wait_for(0).await.unwrap();
        let target = scheduler.seek(30.0).await.unwrap();
        assert_eq!(target.index, 10);

        scheduler.wait_for(10).await.unwrap();
        let requests = source.requests();
        assert_eq!(
            requests[..3],
            [(Quality::P240, 0), (Quality::P240, 1), (Quality::P240, 10)]
        );
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_cancel_stops_requests() {
        let source = FakeSource::with(
            (0..100).map(|i| (Quality::P240, i)),
            Duration::from_millis(10),
        );
        let cancel = CancellationToken::new();
        let mut scheduler = PlaybackScheduler::start(source.clone(), plan(300.0, 100), 0, &cancel);

        scheduler.wait_for(1).await.unwrap();
        cancel.cancel();
        let issued = source.requests().len();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(source.requests().len() <= issued + 1);
        let settled = source.requests().len();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(source.requests().len(), settled);
        assert!(settled < 100);

        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_undrained_events_never_block_the_worker() {
        let source = FakeSource::with((0..2).map(|i| (Quality::P240, i)), Duration::ZERO);
        let cancel = CancellationToken::new();
        let mut scheduler = PlaybackScheduler::start(source.clone(), plan(6.0, 2), 0, &cancel);

        // Every seek to the last segment ends in another Complete event.
        for _ in 0..(EVENT_CAPACITY * 3) {
            tokio::time::timeout(Duration::from_secs(1), scheduler.seek(5.0))
                .await
                .expect("seek blocked")
                .unwrap();
        }

        scheduler.wait_for(1).await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), scheduler.stop())
            .await
            .expect("worker did not stop");
    }

    #[tokio::test]
    async fn test_failure_is_visible_without_reading_events() {
        let source = FakeSource::with([(Quality::P240, 0)], Duration::ZERO);
        let cancel = CancellationToken::new();
        let scheduler = PlaybackScheduler::start(source, plan(6.0, 2), 0, &cancel);

        let mut availability = scheduler.subscribe();
        let failure = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if let Some(failure) = availability.borrow_and_update().failure(1).cloned() {
                    return failure;
                }
                availability.changed().await.unwrap();
            }
        })
        .await
        .unwrap();

        assert_eq!(failure.quality, Quality::P144);
        assert!(availability.borrow().contains(0));
    }

    #[test]
    fn test_buffer_pair_swaps_at_projected_end() {
        let plan = plan(11.0, 4);
        let mut buffers = BufferPair::new();
        let t0 = Instant::now();

        let seg = |index| Available {
            index,
            quality: Quality::P240,
            path: PathBuf::from(format!("{index}.mp4")),
        };

        assert_eq!(buffers.seek(&seg(0), 0.0, t0), Some(0));
        buffers.load_idle(&seg(1), 0.0);

        assert_eq!(buffers.tick(&plan, t0 + Duration::from_secs(2)), None);
        assert_eq!(buffers.tick(&plan, t0 + Duration::from_secs(3)), Some(1));
        assert_eq!(buffers.idle(), None);

        // Next segment not loaded yet: playback holds.
        assert_eq!(buffers.tick(&plan, t0 + Duration::from_secs(7)), None);
        assert_eq!(buffers.current_index(), Some(1));
    }

    #[test]
    fn test_buffer_pair_seek_with_offset() {
        let plan = plan(11.0, 4);
        let mut buffers = BufferPair::new();
        let t0 = Instant::now();
        let last = Available {
            index: 3,
            quality: Quality::P240,
            path: PathBuf::from("3.mp4"),
        };

        buffers.seek(&last, 0.5, t0);
        assert_eq!(
            buffers.projected_end(&plan),
            Some(t0 + Duration::from_millis(1500))
        );
        assert!(!buffers.finished(&plan, t0 + Duration::from_secs(1)));
        assert!(buffers.finished(&plan, t0 + Duration::from_secs(2)));
    }
}

//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which wires an in-memory database, a temporary
//! data directory and a [`FakeTranscoder`] into a [`ServerContext`]. The
//! [`TestHarness::with_server`] constructor also starts the session server
//! on a random port.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use vidforge::client::{ClientOptions, Connection};
use vidforge::config::Config;
use vidforge::server::{Server, ServerContext};
use vidforge_av::{EncodeJob, SourceInfo, Transcoder};
use vidforge_common::Quality;
use vidforge_db::pool::{init_memory_pool, DbPool};

/// Transcoder that writes one small file per expected segment instead of
/// running ffmpeg.
pub struct FakeTranscoder {
    pub info: SourceInfo,
    /// Qualities whose encode writes one segment and then fails.
    pub broken: Vec<Quality>,
}

impl FakeTranscoder {
    pub fn new(height: u32, duration: f64) -> Self {
        Self {
            info: SourceInfo {
                width: height * 16 / 9,
                height,
                fps: 30.0,
                codec: "h264".into(),
                duration,
            },
            broken: Vec::new(),
        }
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    fn check_available(&self) -> vidforge_av::Result<String> {
        Ok("fake".into())
    }

    async fn probe(&self, _source: &Path) -> vidforge_av::Result<SourceInfo> {
        Ok(self.info.clone())
    }

    async fn encode(&self, job: &EncodeJob) -> vidforge_av::Result<()> {
        if self.broken.contains(&job.quality) {
            std::fs::write(job.output_dir.join(format!("{}_0.mp4", job.prefix)), b"partial")?;
            return Err(vidforge_av::Error::tool_failed("ffmpeg", "encoder crashed"));
        }
        for i in 0..self.info.expected_segments(job.segment_duration) {
            let body = format!("{}:{}", job.prefix, i);
            std::fs::write(job.output_dir.join(format!("{}_{i}.mp4", job.prefix)), body)?;
        }
        Ok(())
    }

    async fn thumbnail(&self, _source: &Path, _at: f64, output: &Path) -> vidforge_av::Result<()> {
        std::fs::write(output, b"jpg")?;
        Ok(())
    }
}

/// Test harness wrapping a fully-constructed [`ServerContext`] backed by an
/// in-memory database and a temporary data directory.
pub struct TestHarness {
    pub ctx: ServerContext,
    pub db: DbPool,
    pub config: Config,
    pub dir: TempDir,
    cancel: CancellationToken,
}

impl TestHarness {
    /// Harness whose uploads probe as a 10 second, 240p source.
    pub fn new() -> Self {
        Self::with_transcoder(FakeTranscoder::new(240, 10.0))
    }

    pub fn with_transcoder(transcoder: impl Transcoder + 'static) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");

        let mut config = Config::default();
        config.server.data_dir = dir.path().join("data");
        config.client.cache_dir = dir.path().join("cache");
        config.auth.bcrypt_cost = 4;
        config.catalog.page_size = 3;

        let db = init_memory_pool().expect("failed to create in-memory pool");
        let ctx = ServerContext::from_config(&config, db.clone(), Arc::new(transcoder));

        Self {
            ctx,
            db,
            config,
            dir,
            cancel: CancellationToken::new(),
        }
    }

    /// Start the session server on a random port and return the harness
    /// together with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        Self::new().serve().await
    }

    pub async fn serve(self) -> (Self, SocketAddr) {
        let server = Server::bind("127.0.0.1:0", self.ctx.clone(), 0)
            .await
            .expect("failed to bind random port");
        let addr = server.local_addr().expect("failed to get local addr");

        let shutdown = self.cancel.clone();
        tokio::spawn(async move {
            server
                .run_until(async move { shutdown.cancelled().await })
                .await
                .ok();
        });

        (self, addr)
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.server.data_dir
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions::from(&self.config.client)
    }

    pub async fn connect(&self, addr: SocketAddr) -> Connection {
        Connection::connect(addr, self.client_options())
            .await
            .expect("failed to connect")
    }

    /// Write a dummy source file of `size` bytes and return its path.
    pub fn source_file(&self, name: &str, size: usize) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, vec![0x42u8; size]).expect("failed to write source");
        path
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

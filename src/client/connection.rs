//! Client side of the session protocol.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use vidforge_common::{paths, Error, Quality, Result, VideoId};
use vidforge_db::models::{Page, UserSummary, Video, VideoSummary};

use super::scheduler::SegmentSource;
use crate::config::ClientConfig;
use crate::protocol::{
    copy_exact, error_from_wire, read_frame, write_frame, Request, Response,
    DEFAULT_MAX_FRAME_BYTES,
};

/// Suffix of a segment file still being downloaded.
const PARTIAL_SUFFIX: &str = "part";

/// Client connection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientOptions {
    /// Where fetched segments are kept.
    pub cache_dir: PathBuf,
    /// Bounds each reply and each stalled read or write of a transfer.
    pub io_timeout: Duration,
    pub max_frame_bytes: u32,
}

impl From<&ClientConfig> for ClientOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            cache_dir: config.cache_dir.clone(),
            io_timeout: config.io_timeout(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

/// Cache location of one segment.
pub fn cached_segment_path(
    cache_dir: &Path,
    video_id: VideoId,
    quality: Quality,
    index: u32,
) -> PathBuf {
    cache_dir
        .join(video_id.to_string())
        .join(quality.label())
        .join(paths::segment_file_name(video_id, quality, index))
}

/// One authenticated-or-not connection to a vidforge server.
pub struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    options: ClientOptions,
}

impl Connection {
    pub async fn connect<A: ToSocketAddrs>(addr: A, options: ClientOptions) -> Result<Self> {
        let stream = tokio::time::timeout(options.io_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| timed_out("connect"))??;
        stream.set_nodelay(true)?;

        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
            options,
        })
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<Page<UserSummary>> {
        let request = Request::Login {
            username: username.to_string(),
            password: password.to_string(),
        };
        match self.call(&request).await? {
            Response::Users(page) => Ok(page),
            other => Err(unexpected(&request, &other)),
        }
    }

    pub async fn register(&mut self, username: &str, password: &str) -> Result<Page<UserSummary>> {
        let request = Request::Register {
            username: username.to_string(),
            password: password.to_string(),
        };
        match self.call(&request).await? {
            Response::Users(page) => Ok(page),
            other => Err(unexpected(&request, &other)),
        }
    }

    pub async fn logout(&mut self) -> Result<bool> {
        match self.call(&Request::Logout).await? {
            Response::Logout { success } => Ok(success),
            other => Err(unexpected(&Request::Logout, &other)),
        }
    }

    pub async fn users(&mut self, page_num: u32) -> Result<Page<UserSummary>> {
        let request = Request::Users { page_num };
        match self.call(&request).await? {
            Response::Users(page) => Ok(page),
            other => Err(unexpected(&request, &other)),
        }
    }

    pub async fn video_page(
        &mut self,
        page_num: u32,
        author: Option<&str>,
    ) -> Result<Page<VideoSummary>> {
        let request = Request::VideoPage {
            page_num,
            author: author.map(str::to_string),
        };
        match self.call(&request).await? {
            Response::Videos(page) => Ok(page),
            other => Err(unexpected(&request, &other)),
        }
    }

    pub async fn video_info(&mut self, video_id: VideoId) -> Result<Video> {
        let request = Request::VideoInfo { video_id };
        match self.call_raw(&request).await? {
            Response::VideoInfo(video) => Ok(video),
            Response::Error { kind, .. } if kind == "NotFound" => {
                Err(Error::not_found("video", video_id))
            }
            other => Err(reject(&request, other)),
        }
    }

    /// Upload a local file and wait until the server has made it playable.
    ///
    /// Requires a logged-in session.
    pub async fn upload(&mut self, source: &Path, title: &str) -> Result<VideoId> {
        let mut file = tokio::fs::File::open(source).await?;
        let file_size = file.metadata().await?.len();

        let request = Request::VideoUpload {
            target: source.to_string_lossy().into_owned(),
            file_size,
            title: title.to_string(),
        };
        match self.call(&request).await? {
            Response::Ack => {}
            other => return Err(unexpected(&request, &other)),
        }

        tracing::debug!(source = %source.display(), file_size, "Sending upload payload");
        copy_exact(&mut file, &mut self.writer, file_size, self.options.io_timeout).await?;

        // Encoding the top rendition can take far longer than a reply timeout.
        match self.receive(None).await? {
            Response::VideoUpload {
                success: true,
                video_id,
            } => Ok(video_id),
            other => Err(reject(&request, other)),
        }
    }

    /// Fetch one segment into the cache and return its local path.
    ///
    /// A segment already in the cache is returned without contacting the
    /// server.
    pub async fn fetch_segment(
        &mut self,
        video_id: VideoId,
        quality: Quality,
        index: u32,
    ) -> Result<PathBuf> {
        let path = cached_segment_path(&self.options.cache_dir, video_id, quality, index);
        if tokio::fs::try_exists(&path).await? {
            tracing::trace!(video_id = %video_id, quality = %quality, segment = index, "Cache hit");
            return Ok(path);
        }

        let request = Request::Video {
            video_id,
            quality,
            segment_id: index,
        };
        let file_size = match self.call_raw(&request).await? {
            Response::Download { file_size, .. } => file_size,
            Response::Error { kind, .. } if kind == "SegmentNotFound" => {
                return Err(Error::SegmentNotFound {
                    video_id: video_id.get(),
                    quality: quality.label().to_string(),
                    index,
                })
            }
            other => return Err(reject(&request, other)),
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = path.with_extension(PARTIAL_SUFFIX);
        let mut file = tokio::fs::File::create(&partial).await?;

        write_frame(&mut self.writer, &Response::Ack).await?;
        if let Err(e) = copy_exact(&mut self.reader, &mut file, file_size, self.options.io_timeout).await {
            drop(file);
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }
        file.sync_all().await?;
        tokio::fs::rename(&partial, &path).await?;

        tracing::debug!(
            video_id = %video_id,
            quality = %quality,
            segment = index,
            file_size,
            "Segment downloaded"
        );
        Ok(path)
    }

    /// Send a request and read its reply, turning an `ERROR` reply into an
    /// error.
    async fn call(&mut self, request: &Request) -> Result<Response> {
        match self.call_raw(request).await? {
            Response::Error { kind, message } => Err(error_from_wire(&kind, message)),
            response => Ok(response),
        }
    }

    async fn call_raw(&mut self, request: &Request) -> Result<Response> {
        write_frame(&mut self.writer, request).await?;
        self.receive(Some(self.options.io_timeout)).await
    }

    async fn receive(&mut self, timeout: Option<Duration>) -> Result<Response> {
        let max = self.options.max_frame_bytes;
        let frame = match timeout {
            Some(limit) => tokio::time::timeout(limit, read_frame(&mut self.reader, max))
                .await
                .map_err(|_| timed_out("reply"))??,
            None => read_frame(&mut self.reader, max).await?,
        };

        let value: Value = frame.ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "server closed the connection",
            ))
        })?;

        Response::from_value(value)
    }
}

#[async_trait]
impl SegmentSource for Connection {
    async fn fetch(&mut self, video_id: VideoId, quality: Quality, index: u32) -> Result<PathBuf> {
        self.fetch_segment(video_id, quality, index).await
    }
}

fn timed_out(what: &str) -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::TimedOut,
        format!("{what} timed out"),
    ))
}

/// Error for a reply that does not answer `request`.
fn reject(request: &Request, response: Response) -> Error {
    if let Response::Error { kind, message } = response {
        return error_from_wire(&kind, message);
    }
    unexpected(request, &response)
}

fn unexpected(request: &Request, response: &Response) -> Error {
    Error::internal(format!(
        "unexpected reply to {}: {:?}",
        request.name(),
        response
    ))
}

//! Per-connection command dispatch.
//!
//! A session reads one framed request at a time, runs it, and writes the
//! reply. Application failures become `ERROR` replies and the loop goes
//! on; only a severed transport, an undecodable frame, or an upload whose
//! payload broke off mid-stream end the session.

use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use vidforge_common::{paths, Error, Quality, Result, VideoId};

use super::ServerContext;
use crate::protocol::{copy_exact, read_frame_bounded, write_frame, Request, Response};

/// Authentication state of one connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticated {
        username: String,
    },
}

impl SessionState {
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated { username } => Some(username),
        }
    }
}

/// What the loop does after a command.
enum Flow {
    Continue,
    Close,
}

/// One client connection.
pub struct Session<R, W> {
    id: u64,
    peer: String,
    reader: BufReader<R>,
    writer: W,
    state: SessionState,
    ctx: Arc<ServerContext>,
}

impl<R, W> Session<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(id: u64, peer: String, reader: R, writer: W, ctx: Arc<ServerContext>) -> Self {
        Self {
            id,
            peer,
            reader: BufReader::new(reader),
            writer,
            state: SessionState::Anonymous,
            ctx,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Serve requests until the peer disconnects or the stream breaks.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            let frame = match self.read_request().await {
                Ok(Some(frame)) => frame,
                Ok(None) => return Ok(()),
                Err(e) => {
                    if matches!(e, Error::MalformedFrame(_)) {
                        // Best effort; the stream is no longer usable either way.
                        let _ = write_frame(&mut self.writer, &Response::error(&e)).await;
                    }
                    return Err(e);
                }
            };

            let outcome = match Request::from_value(frame) {
                Ok(request) => {
                    tracing::debug!(
                        session_id = self.id,
                        peer = %self.peer,
                        command = request.name(),
                        "Request"
                    );
                    self.dispatch(request).await
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok(Flow::Continue) => {}
                Ok(Flow::Close) => return Ok(()),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        session_id = self.id,
                        peer = %self.peer,
                        kind = e.kind(),
                        "Command failed: {}",
                        e
                    );
                    self.reply(&Response::error(&e)).await?;
                }
            }
        }
    }

    async fn dispatch(&mut self, request: Request) -> Result<Flow> {
        match request {
            Request::Login { username, password } => {
                self.ctx.credentials.login(&username, &password).await?;
                self.authenticate(username).await
            }
            Request::Register { username, password } => {
                self.ctx.credentials.register(&username, &password).await?;
                self.authenticate(username).await
            }
            Request::Logout => {
                if let Some(username) = self.state.username() {
                    tracing::info!(session_id = self.id, username = %username, "Logged out");
                }
                self.state = SessionState::Anonymous;
                self.reply(&Response::Logout { success: true }).await?;
                Ok(Flow::Continue)
            }
            Request::Users { page_num } => {
                let page = self.ctx.catalog.list_users(page_num)?;
                self.reply(&Response::Users(page)).await?;
                Ok(Flow::Continue)
            }
            Request::VideoPage { page_num, author } => {
                let page = self.ctx.catalog.list_videos(page_num, author.as_deref())?;
                self.reply(&Response::Videos(page)).await?;
                Ok(Flow::Continue)
            }
            Request::VideoInfo { video_id } => {
                let video = self.ctx.catalog.get_video_info(video_id)?;
                self.reply(&Response::VideoInfo(video)).await?;
                Ok(Flow::Continue)
            }
            Request::Video {
                video_id,
                quality,
                segment_id,
            } => self.send_segment(video_id, quality, segment_id).await,
            Request::VideoUpload {
                target,
                file_size,
                title,
            } => self.receive_upload(&target, file_size, &title).await,
        }
    }

    /// Enter the authenticated state and send the first page of users.
    async fn authenticate(&mut self, username: String) -> Result<Flow> {
        tracing::info!(session_id = self.id, username = %username, "Authenticated");
        self.state = SessionState::Authenticated { username };

        let page = self.ctx.catalog.list_users(0)?;
        self.reply(&Response::Users(page)).await?;
        Ok(Flow::Continue)
    }

    async fn receive_upload(&mut self, target: &str, file_size: u64, title: &str) -> Result<Flow> {
        let author = self
            .state
            .username()
            .ok_or(Error::NotAuthenticated)?
            .to_string();

        if file_size == 0 {
            return Err(Error::invalid_input("file_size must be greater than zero"));
        }

        self.ctx.pipeline.check_encoder()?;

        let data_dir = self.ctx.pipeline.data_dir().to_path_buf();
        let video_id = self.ctx.catalog.start_upload(title, &author)?;
        let root = paths::video_root(&data_dir, video_id);
        tokio::fs::create_dir_all(&root).await?;
        let original = paths::original_path(&data_dir, video_id, &paths::upload_extension(target));

        tracing::info!(
            session_id = self.id,
            video_id = %video_id,
            file_size,
            "Receiving upload"
        );

        self.reply(&Response::Ack).await?;

        if let Err(e) = self.store_payload(&original, file_size).await {
            tracing::warn!(session_id = self.id, video_id = %video_id, "Upload aborted: {}", e);
            if let Err(cleanup) = tokio::fs::remove_dir_all(&root).await {
                tracing::debug!(video_id = %video_id, "Failed to clean up upload: {}", cleanup);
            }
            // The stream position is unknown now, so the session cannot go on.
            let _ = self.reply(&Response::error(&e)).await;
            return Ok(Flow::Close);
        }

        let processed = self.ctx.pipeline.process(video_id, &original).await?;
        tracing::info!(
            session_id = self.id,
            video_id = %video_id,
            quality = %processed.max_quality,
            "Upload ready"
        );

        self.reply(&Response::VideoUpload {
            success: true,
            video_id,
        })
        .await?;
        Ok(Flow::Continue)
    }

    async fn store_payload(&mut self, path: &Path, file_size: u64) -> Result<()> {
        let mut file = tokio::fs::File::create(path).await?;
        copy_exact(
            &mut self.reader,
            &mut file,
            file_size,
            self.ctx.limits.io_timeout,
        )
        .await?;
        file.sync_all().await?;
        Ok(())
    }

    async fn send_segment(&mut self, video_id: VideoId, quality: Quality, index: u32) -> Result<Flow> {
        let path = paths::segment_path(self.ctx.pipeline.data_dir(), video_id, quality, index);

        let size = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => {
                return Err(Error::SegmentNotFound {
                    video_id: video_id.get(),
                    quality: quality.label().to_string(),
                    index,
                })
            }
        };
        let mut file = tokio::fs::File::open(&path).await?;

        self.reply(&Response::Download {
            target: paths::segment_file_name(video_id, quality, index),
            file_size: size,
        })
        .await?;

        let limit = self.ctx.limits.io_timeout;
        let ack = match tokio::time::timeout(limit, self.read_request()).await {
            Ok(frame) => match frame? {
                Some(frame) => frame,
                None => return Ok(Flow::Close),
            },
            Err(_) => {
                let e = Error::transfer_aborted(format!("no ACK within {limit:?}"));
                tracing::debug!(
                    session_id = self.id,
                    video_id = %video_id,
                    "Segment send abandoned: {}",
                    e
                );
                // A late ACK would be read as a command, so the session ends here.
                let _ = self.reply(&Response::error(&e)).await;
                return Ok(Flow::Close);
            }
        };
        if !Response::is_ack(&ack) {
            return Err(Error::transfer_aborted(format!(
                "expected ACK before segment transfer, got {ack}"
            )));
        }

        if let Err(e) = copy_exact(&mut file, &mut self.writer, size, self.ctx.limits.io_timeout).await {
            tracing::debug!(session_id = self.id, video_id = %video_id, "Segment send failed: {}", e);
            return Ok(Flow::Close);
        }

        tracing::trace!(
            session_id = self.id,
            video_id = %video_id,
            quality = %quality,
            segment = index,
            "Segment sent"
        );
        Ok(Flow::Continue)
    }

    async fn read_request(&mut self) -> Result<Option<serde_json::Value>> {
        read_frame_bounded(
            &mut self.reader,
            self.ctx.limits.max_frame_bytes,
            self.ctx.limits.io_timeout,
        )
        .await
    }

    async fn reply(&mut self, response: &Response) -> Result<()> {
        write_frame(&mut self.writer, response).await
    }
}

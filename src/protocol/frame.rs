//! Length-prefixed framing.
//!
//! Every control message is a big-endian `u32` byte count followed by that
//! many bytes of JSON. Binary payloads (uploads, segments) are sent raw
//! between control messages, with their length announced beforehand, and
//! are copied until exactly that many bytes have moved.

use std::time::Duration;

use bytes::{BufMut, BytesMut};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use vidforge_common::{Error, Result};

/// Largest control message accepted by default.
pub const DEFAULT_MAX_FRAME_BYTES: u32 = 1024 * 1024;

const HEADER_LEN: usize = 4;
const COPY_CHUNK: usize = 64 * 1024;

/// Read one control message.
///
/// Returns `Ok(None)` when the peer closed the connection cleanly between
/// frames. A connection closed part-way through a frame, an oversized
/// length, or a body that is not JSON are all errors that end the session.
pub async fn read_frame<R>(reader: &mut R, max_len: u32) -> Result<Option<serde_json::Value>>
where
    R: AsyncRead + Unpin,
{
    read_frame_inner(reader, max_len, None).await
}

/// Like [`read_frame`], but once a header has arrived the rest of the
/// frame must follow within `stall_timeout`.
///
/// Waiting for the header itself is unbounded, so an idle peer is fine;
/// a peer that stops part-way through a frame is a [`Error::MalformedFrame`].
pub async fn read_frame_bounded<R>(
    reader: &mut R,
    max_len: u32,
    stall_timeout: Duration,
) -> Result<Option<serde_json::Value>>
where
    R: AsyncRead + Unpin,
{
    read_frame_inner(reader, max_len, Some(stall_timeout)).await
}

async fn read_frame_inner<R>(
    reader: &mut R,
    max_len: u32,
    stall_timeout: Option<Duration>,
) -> Result<Option<serde_json::Value>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        let n = if filled == 0 {
            reader.read(&mut header).await?
        } else {
            within(stall_timeout, reader.read(&mut header[filled..])).await??
        };
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(Error::MalformedFrame(format!(
                "connection closed after {filled} header bytes"
            )));
        }
        filled += n;
    }

    let len = u32::from_be_bytes(header);
    if len > max_len {
        return Err(Error::MalformedFrame(format!(
            "frame of {len} bytes exceeds limit of {max_len}"
        )));
    }

    let mut body = vec![0u8; len as usize];
    within(stall_timeout, reader.read_exact(&mut body))
        .await?
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::MalformedFrame(format!("connection closed inside a {len} byte frame"))
            } else {
                Error::Io(e)
            }
        })?;

    serde_json::from_slice(&body)
        .map(Some)
        .map_err(|e| Error::MalformedFrame(format!("frame is not valid JSON: {e}")))
}

/// Await `fut`, failing with [`Error::MalformedFrame`] if `limit` elapses.
async fn within<F: std::future::Future>(limit: Option<Duration>, fut: F) -> Result<F::Output> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| Error::MalformedFrame(format!("frame stalled for {limit:?}"))),
        None => Ok(fut.await),
    }
}

/// Write one control message and flush it.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let body = serde_json::to_vec(message).map_err(|e| Error::internal(e.to_string()))?;
    let len = u32::try_from(body.len())
        .map_err(|_| Error::internal(format!("frame of {} bytes is too large", body.len())))?;

    let mut buf = BytesMut::with_capacity(HEADER_LEN + body.len());
    buf.put_u32(len);
    buf.put_slice(&body);

    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Copy exactly `size` bytes from `reader` to `writer`.
///
/// Each read and write must make progress within `stall_timeout`. A peer
/// that closes early or stalls yields [`Error::TransferAborted`].
pub async fn copy_exact<R, W>(
    reader: &mut R,
    writer: &mut W,
    size: u64,
    stall_timeout: Duration,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; COPY_CHUNK];
    let mut remaining = size;

    while remaining > 0 {
        let want = usize::try_from(remaining).map_or(COPY_CHUNK, |r| r.min(COPY_CHUNK));
        let n = tokio::time::timeout(stall_timeout, reader.read(&mut buf[..want]))
            .await
            .map_err(|_| {
                Error::transfer_aborted(format!(
                    "stalled for {stall_timeout:?} with {remaining} of {size} bytes outstanding"
                ))
            })?
            .map_err(|e| Error::transfer_aborted(format!("read failed: {e}")))?;

        if n == 0 {
            return Err(Error::transfer_aborted(format!(
                "stream ended with {remaining} of {size} bytes outstanding"
            )));
        }

        tokio::time::timeout(stall_timeout, writer.write_all(&buf[..n]))
            .await
            .map_err(|_| Error::transfer_aborted(format!("write stalled for {stall_timeout:?}")))?
            .map_err(|e| Error::transfer_aborted(format!("write failed: {e}")))?;

        remaining -= n as u64;
    }

    tokio::time::timeout(stall_timeout, writer.flush())
        .await
        .map_err(|_| Error::transfer_aborted(format!("flush stalled for {stall_timeout:?}")))?
        .map_err(|e| Error::transfer_aborted(format!("flush failed: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::AsyncWriteExt;
    use tokio_test::io::Builder;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn encode(value: &serde_json::Value) -> Vec<u8> {
        let body = serde_json::to_vec(value).unwrap();
        let mut out = (body.len() as u32).to_be_bytes().to_vec();
        out.extend(body);
        out
    }

    #[tokio::test]
    async fn test_frame_split_across_reads() {
        let bytes = encode(&json!({"type": "USERS", "page_num": 0}));
        let (head, tail) = bytes.split_at(3);
        let (mid, rest) = tail.split_at(5);

        let mut reader = Builder::new().read(head).read(mid).read(rest).build();
        let frame = read_frame(&mut reader, DEFAULT_MAX_FRAME_BYTES)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame["type"], "USERS");
    }

    #[tokio::test]
    async fn test_two_frames_in_one_read() {
        let mut bytes = encode(&json!({"type": "LOGOUT"}));
        bytes.extend(encode(&json!({"type": "USERS", "page_num": 1})));

        let mut reader = Builder::new().read(&bytes).build();
        let first = read_frame(&mut reader, 1024).await.unwrap().unwrap();
        let second = read_frame(&mut reader, 1024).await.unwrap().unwrap();
        assert_eq!(first["type"], "LOGOUT");
        assert_eq!(second["page_num"], 1);
    }

    #[tokio::test]
    async fn test_clean_eof_between_frames() {
        let mut reader = Builder::new().build();
        assert!(read_frame(&mut reader, 1024).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_truncated_frame_is_malformed() {
        let bytes = encode(&json!({"type": "LOGOUT"}));
        let mut reader = Builder::new().read(&bytes[..bytes.len() - 2]).build();
        let err = read_frame(&mut reader, 1024).await.unwrap_err();
        assert!(matches!(err, Error::MalformedFrame(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_oversized_frame_is_malformed() {
        let mut reader = Builder::new().read(&100_000u32.to_be_bytes()).build();
        let err = read_frame(&mut reader, 1024).await.unwrap_err();
        assert!(matches!(err, Error::MalformedFrame(_)));
    }

    #[tokio::test]
    async fn test_non_json_body_is_malformed() {
        let mut bytes = 3u32.to_be_bytes().to_vec();
        bytes.extend(b"abc");
        let mut reader = Builder::new().read(&bytes).build();
        assert!(matches!(
            read_frame(&mut reader, 1024).await,
            Err(Error::MalformedFrame(_))
        ));
    }

    #[tokio::test]
    async fn test_stalled_frame_body_is_malformed() {
        let (mut tx, mut rx) = tokio::io::duplex(64);
        tx.write_all(&10u32.to_be_bytes()).await.unwrap();
        tx.write_all(b"{\"ty").await.unwrap();

        let err = read_frame_bounded(&mut rx, 1024, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedFrame(_)));
        drop(tx);
    }

    #[tokio::test]
    async fn test_bounded_read_waits_for_idle_peer() {
        let (mut tx, mut rx) = tokio::io::duplex(64);
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            write_frame(&mut tx, &json!({"type": "LOGOUT"})).await.unwrap();
            tx
        });

        let frame = read_frame_bounded(&mut rx, 1024, Duration::from_millis(20))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame["type"], "LOGOUT");
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        write_frame(&mut client, &json!({"type": "ACK"})).await.unwrap();
        let frame = read_frame(&mut server, 1024).await.unwrap().unwrap();
        assert_eq!(frame, json!({"type": "ACK"}));
    }

    #[tokio::test]
    async fn test_copy_exact_leaves_following_bytes() {
        let mut payload = vec![7u8; 10];
        payload.extend(encode(&json!({"type": "LOGOUT"})));
        let mut reader = Builder::new().read(&payload[..4]).read(&payload[4..]).build();

        let mut sink = Vec::new();
        copy_exact(&mut reader, &mut sink, 10, TIMEOUT).await.unwrap();
        assert_eq!(sink, vec![7u8; 10]);

        let next = read_frame(&mut reader, 1024).await.unwrap().unwrap();
        assert_eq!(next["type"], "LOGOUT");
    }

    #[tokio::test]
    async fn test_copy_exact_short_stream_aborts() {
        let mut reader = Builder::new().read(&[1, 2, 3]).build();
        let mut sink = Vec::new();
        let err = copy_exact(&mut reader, &mut sink, 10, TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TransferAborted(_)));
    }

    #[tokio::test]
    async fn test_copy_exact_stall_aborts() {
        let (mut tx, mut rx) = tokio::io::duplex(64);
        tx.write_all(&[1, 2]).await.unwrap();

        let mut sink = Vec::new();
        let err = copy_exact(&mut rx, &mut sink, 10, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TransferAborted(_)));
        drop(tx);
    }
}

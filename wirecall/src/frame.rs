//! Length-prefixed frame io over any byte stream.
//!
//! The first 8 bytes of every frame are the header and body lengths as two
//! big-endian u32s, matching the codec's own fixed header, so the reader can
//! reconstruct a whole frame without knowing whether it holds a request or a
//! response.

use std::io;

use bytes::Buf;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::message::FIXED_HEADER_LENGTH;

/// Byte size of the generic length prefix shared by all frames.
pub const LENGTH_PREFIX: usize = 8;

/// Largest frame the reader will reconstruct. A prefix past this is treated
/// as protocol corruption rather than an allocation request.
pub const MAX_FRAME_LENGTH: usize = 64 << 20;

/// Read one whole frame, blocking until every byte of it has arrived.
///
/// Returns the full reconstructed buffer, length prefix included, ready for
/// [`crate::Request::decode`] or [`crate::Response::decode`]. The underlying
/// stream primitive may return short reads; `read_exact` loops until the
/// requested count is read or the connection errors or closes.
pub async fn read_frame<S>(stream: &mut S) -> io::Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    let mut prefix = [0u8; LENGTH_PREFIX];
    stream.read_exact(&mut prefix).await?;
    let mut lengths = &prefix[..];
    let header_length = lengths.get_u32() as usize;
    let body_length = lengths.get_u32() as usize;

    if header_length < FIXED_HEADER_LENGTH {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame header length {header_length} is below the fixed minimum"),
        ));
    }
    let frame_length = header_length + body_length;
    if frame_length > MAX_FRAME_LENGTH {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame length {frame_length} exceeds the {MAX_FRAME_LENGTH} byte limit"),
        ));
    }

    let mut frame = vec![0u8; frame_length];
    frame[..LENGTH_PREFIX].copy_from_slice(&prefix);
    stream.read_exact(&mut frame[LENGTH_PREFIX..]).await?;
    Ok(frame)
}

/// Write an already-encoded frame in full.
pub async fn write_frame<S>(stream: &mut S, frame: &[u8]) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(frame).await?;
    stream.flush().await
}

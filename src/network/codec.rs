//! Frame transport.
//!
//! Each direction of a connection carries one frame: a 4-byte big-endian length
//! followed by a JSON payload.

use crate::error::{ChatError, ChatResult};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Largest payload accepted in either direction.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

pub type FramedStream = Framed<TcpStream, LengthDelimitedCodec>;

/// Wrap a connected socket in the length-prefixed codec.
pub fn frame(stream: TcpStream) -> FramedStream {
    LengthDelimitedCodec::builder()
        .length_field_length(4)
        .big_endian()
        .max_frame_length(MAX_FRAME_LEN)
        .new_framed(stream)
}

/// Serialize `value` and write it as one frame.
pub async fn write_frame<T: Serialize>(
    framed: &mut FramedStream,
    value: &T,
    limit: Duration,
) -> ChatResult<()> {
    let payload = serde_json::to_vec(value)?;
    timeout(limit, framed.send(Bytes::from(payload)))
        .await
        .map_err(|_| ChatError::Timeout(limit))??;
    Ok(())
}

/// Read one frame and deserialize it.
pub async fn read_frame<T: DeserializeOwned>(
    framed: &mut FramedStream,
    limit: Duration,
) -> ChatResult<T> {
    let frame = timeout(limit, framed.next())
        .await
        .map_err(|_| ChatError::Timeout(limit))?
        .ok_or(ChatError::ConnectionClosed)??;
    Ok(serde_json::from_slice(&frame)?)
}

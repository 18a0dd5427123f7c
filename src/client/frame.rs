//! Length-prefixed frame reassembly.
//!
//! Frame: int32 (BE) length + payload. Chunks arrive in arbitrary sizes; complete
//! frames are split off the accumulation buffer as they become available.

use crate::config::{DEFAULT_MAX_FRAME_SIZE, DEFAULT_READ_BUFFER_CAPACITY};
use crate::error::{Result, ThorwireError};
use crate::protocol::buffer::ReadBuffer;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

const LENGTH_PREFIX: usize = 4;

#[derive(Debug)]
pub struct FrameReader {
    buffer: BytesMut,
    max_frame_size: usize,
    read_capacity: usize,
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE, DEFAULT_READ_BUFFER_CAPACITY)
    }
}

impl FrameReader {
    pub fn new(max_frame_size: usize, read_capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(read_capacity),
            max_frame_size,
            read_capacity: read_capacity.max(1),
        }
    }

    /// Bytes received but not yet part of a complete frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.put_slice(chunk);
    }

    /// Split off the next complete frame payload, if one has fully arrived.
    ///
    /// A negative or oversized length prefix is an error; the stream cannot be
    /// resynchronised after one.
    pub fn next_frame(&mut self) -> Result<Option<ReadBuffer>> {
        if self.buffer.len() < LENGTH_PREFIX {
            return Ok(None);
        }
        let len = i32::from_be_bytes([
            self.buffer[0],
            self.buffer[1],
            self.buffer[2],
            self.buffer[3],
        ]);
        if len < 0 {
            return Err(ThorwireError::Decoding(format!("negative frame length {}", len)));
        }
        let len = len as usize;
        if len > self.max_frame_size {
            return Err(ThorwireError::FrameTooLarge {
                size: len,
                max: self.max_frame_size,
            });
        }
        if self.buffer.len() < LENGTH_PREFIX + len {
            return Ok(None);
        }
        self.buffer.advance(LENGTH_PREFIX);
        let payload: Bytes = self.buffer.split_to(len).freeze();
        Ok(Some(ReadBuffer::new(payload)))
    }

    /// Read one chunk from `reader` into the accumulation buffer. Returns the
    /// number of bytes read; 0 means the peer closed the stream.
    pub async fn read_from<R>(&mut self, reader: &mut R) -> Result<usize>
    where
        R: AsyncRead + Unpin,
    {
        self.buffer.reserve(self.read_capacity);
        reader
            .read_buf(&mut self.buffer)
            .await
            .map_err(|e| ThorwireError::Transport(e.to_string()))
    }
}

/// Prefix `payload` with its int32 (BE) length.
pub fn frame(payload: &[u8]) -> Result<Bytes> {
    let len = i32::try_from(payload.len())
        .map_err(|_| ThorwireError::Encoding(format!("frame of {} bytes", payload.len())))?;
    let mut framed = BytesMut::with_capacity(LENGTH_PREFIX + payload.len());
    framed.put_i32(len);
    framed.put_slice(payload);
    Ok(framed.freeze())
}

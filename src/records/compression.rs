//! Record set compression codecs.
//!
//! Ids follow the protocol's compression-type enumeration (attributes bits 0-2).
//! Codec work runs on the blocking pool so large batches don't stall the runtime.

use crate::error::{Result, ThorwireError};
use bytes::Bytes;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};

/// Header of Java-framed ("xerial") snappy streams.
const XERIAL_MAGIC: [u8; 8] = [0x82, b'S', b'N', b'A', b'P', b'P', b'Y', 0];
const XERIAL_HEADER_LEN: usize = 16;

/// Attribute bits holding the compression id.
pub const COMPRESSION_MASK: i16 = 0x07;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Snappy,
    Lz4,
    Zstd,
}

impl Compression {
    pub const ALL: [Compression; 5] = [
        Compression::None,
        Compression::Gzip,
        Compression::Snappy,
        Compression::Lz4,
        Compression::Zstd,
    ];

    pub fn id(self) -> i8 {
        match self {
            Compression::None => 0,
            Compression::Gzip => 1,
            Compression::Snappy => 2,
            Compression::Lz4 => 3,
            Compression::Zstd => 4,
        }
    }

    pub fn from_id(id: i8) -> Result<Self> {
        match id {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Gzip),
            2 => Ok(Compression::Snappy),
            3 => Ok(Compression::Lz4),
            4 => Ok(Compression::Zstd),
            other => Err(ThorwireError::Compression(format!(
                "unknown compression id {}",
                other
            ))),
        }
    }

    /// Codec selected by a record batch's attributes.
    pub fn from_attributes(attributes: i16) -> Result<Self> {
        Self::from_id((attributes & COMPRESSION_MASK) as i8)
    }

    pub async fn compress(self, data: Bytes) -> Result<Bytes> {
        if self == Compression::None {
            return Ok(data);
        }
        self.run_blocking(move || self.compress_blocking(&data)).await
    }

    pub async fn decompress(self, data: Bytes) -> Result<Bytes> {
        if self == Compression::None {
            return Ok(data);
        }
        self.run_blocking(move || self.decompress_blocking(&data)).await
    }

    async fn run_blocking<F>(self, f: F) -> Result<Bytes>
    where
        F: FnOnce() -> Result<Vec<u8>> + Send + 'static,
    {
        tokio::task::spawn_blocking(f)
            .await
            .map_err(|e| ThorwireError::Compression(format!("{} task failed: {}", self, e)))?
            .map(Bytes::from)
    }

    fn compress_blocking(self, data: &[u8]) -> Result<Vec<u8>> {
        let out = match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(data).and_then(|_| encoder.finish())
            }
            Compression::Snappy => snap::raw::Encoder::new()
                .compress_vec(data)
                .map_err(std::io::Error::other),
            Compression::Lz4 => {
                let mut encoder = lz4_flex::frame::FrameEncoder::new(Vec::new());
                encoder
                    .write_all(data)
                    .and_then(|_| encoder.finish().map_err(std::io::Error::other))
            }
            Compression::Zstd => zstd::encode_all(data, 0),
        };
        out.map_err(|e| ThorwireError::Compression(format!("{} compress: {}", self, e)))
    }

    fn decompress_blocking(self, data: &[u8]) -> Result<Vec<u8>> {
        let out = match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Gzip => {
                let mut out = Vec::new();
                GzDecoder::new(data).read_to_end(&mut out).map(|_| out)
            }
            Compression::Snappy => snappy_decompress(data),
            Compression::Lz4 => {
                let mut out = Vec::new();
                lz4_flex::frame::FrameDecoder::new(data)
                    .read_to_end(&mut out)
                    .map(|_| out)
            }
            Compression::Zstd => zstd::decode_all(data),
        };
        out.map_err(|e| ThorwireError::Compression(format!("{} decompress: {}", self, e)))
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
            Compression::Snappy => "snappy",
            Compression::Lz4 => "lz4",
            Compression::Zstd => "zstd",
        };
        f.write_str(name)
    }
}

/// Raw snappy block, or the xerial framing Java producers emit.
fn snappy_decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = snap::raw::Decoder::new();
    if !data.starts_with(&XERIAL_MAGIC) {
        return decoder.decompress_vec(data).map_err(std::io::Error::other);
    }
    if data.len() < XERIAL_HEADER_LEN {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "truncated xerial header",
        ));
    }
    let mut rest = &data[XERIAL_HEADER_LEN..];
    let mut out = Vec::new();
    while !rest.is_empty() {
        if rest.len() < 4 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "truncated xerial chunk length",
            ));
        }
        let len = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        rest = &rest[4..];
        if rest.len() < len {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "truncated xerial chunk",
            ));
        }
        let chunk = decoder
            .decompress_vec(&rest[..len])
            .map_err(std::io::Error::other)?;
        out.extend_from_slice(&chunk);
        rest = &rest[len..];
    }
    Ok(out)
}

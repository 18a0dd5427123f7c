//! Thorwire: Kafka wire protocol client transport.
//!
//! Primitive codecs, compressed record batches, a pipelined connection with
//! strict FIFO response matching and a session that negotiates API versions.

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod records;
pub mod types;

pub use client::{Connection, FrameReader, Session};
pub use config::ClientConfig;
pub use error::{Result, ThorwireError};
pub use protocol::{ReadBuffer, Request, RequestBuilder, WriteBuffer};
pub use records::{CompressedRecords, Compression, Record, RecordBatch, RecordHeader};
pub use types::{SupportedApiVersions, VersionRange};

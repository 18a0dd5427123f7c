//! RecordBatch (magic 2) envelope around a [`CompressedRecords`] region.
//!
//! base_offset i64 | batch_length i32 | partition_leader_epoch i32 | magic i8 |
//! crc u32 | attributes i16 | last_offset_delta i32 | base_timestamp i64 |
//! max_timestamp i64 | producer_id i64 | producer_epoch i16 | base_sequence i32 |
//! records
//!
//! `batch_length` counts everything after itself. The CRC-32C covers attributes
//! through the end of the batch.

use crate::error::{Result, ThorwireError};
use crate::protocol::buffer::{ReadBuffer, WriteBuffer};
use crate::records::compressed::CompressedRecords;
use crate::records::compression::{Compression, COMPRESSION_MASK};
use crate::records::record::Record;

pub const RECORD_BATCH_MAGIC: i8 = 2;

pub const TIMESTAMP_TYPE_FLAG: i16 = 0x08;
pub const TRANSACTIONAL_FLAG: i16 = 0x10;
pub const CONTROL_FLAG: i16 = 0x20;

/// partition_leader_epoch through base_sequence, i.e. the bytes `batch_length`
/// covers before the records region.
const HEADER_AFTER_LENGTH: usize = 4 + 1 + 4 + 2 + 4 + 8 + 8 + 8 + 2 + 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordBatch {
    pub base_offset: i64,
    pub partition_leader_epoch: i32,
    /// Flag bits other than the compression id, which comes from `records`.
    pub attributes: i16,
    pub last_offset_delta: i32,
    pub base_timestamp: i64,
    pub max_timestamp: i64,
    pub producer_id: i64,
    pub producer_epoch: i16,
    pub base_sequence: i32,
    pub records: CompressedRecords,
}

impl RecordBatch {
    /// Non-transactional batch with no producer identity. Offset and timestamp
    /// bounds are derived from the records' deltas.
    pub fn new(
        base_offset: i64,
        base_timestamp: i64,
        records: Vec<Record>,
        compression: Compression,
    ) -> Self {
        let last_offset_delta = records.iter().map(|r| r.offset_delta).max().unwrap_or(0);
        let max_timestamp = records
            .iter()
            .map(|r| base_timestamp.saturating_add(r.timestamp_delta))
            .max()
            .unwrap_or(base_timestamp);
        Self {
            base_offset,
            partition_leader_epoch: -1,
            attributes: 0,
            last_offset_delta,
            base_timestamp,
            max_timestamp,
            producer_id: -1,
            producer_epoch: -1,
            base_sequence: -1,
            records: CompressedRecords::new(records, compression),
        }
    }

    pub fn compression(&self) -> Compression {
        self.records.compression
    }

    pub fn is_transactional(&self) -> bool {
        self.attributes & TRANSACTIONAL_FLAG != 0
    }

    pub fn is_control(&self) -> bool {
        self.attributes & CONTROL_FLAG != 0
    }

    /// True when timestamps are broker append times rather than create times.
    pub fn uses_log_append_time(&self) -> bool {
        self.attributes & TIMESTAMP_TYPE_FLAG != 0
    }

    pub fn last_offset(&self) -> i64 {
        self.base_offset.saturating_add(i64::from(self.last_offset_delta))
    }

    pub async fn serialize(&self, buf: &mut WriteBuffer) -> Result<()> {
        buf.put_i64(self.base_offset);
        let length_pos = buf.len();
        buf.put_i32(0);
        buf.put_i32(self.partition_leader_epoch);
        buf.put_i8(RECORD_BATCH_MAGIC);
        let crc_pos = buf.len();
        buf.put_u32(0);
        let crc_start = buf.len();

        let attributes =
            (self.attributes & !COMPRESSION_MASK) | i16::from(self.records.compression.id());
        buf.put_i16(attributes);
        buf.put_i32(self.last_offset_delta);
        buf.put_i64(self.base_timestamp);
        buf.put_i64(self.max_timestamp);
        buf.put_i64(self.producer_id);
        buf.put_i16(self.producer_epoch);
        buf.put_i32(self.base_sequence);
        self.records.serialize(buf).await?;

        let crc = crc32c::crc32c(&buf.as_slice()[crc_start..]);
        buf.patch_u32(crc_pos, crc)?;
        let batch_length = i32::try_from(buf.len() - length_pos - 4)
            .map_err(|_| ThorwireError::Encoding("record batch too large".into()))?;
        buf.patch_i32(length_pos, batch_length)
    }

    /// Decode one batch, verifying magic and CRC and choosing the codec from the
    /// attributes.
    pub async fn deserialize(buf: &mut ReadBuffer) -> Result<Self> {
        let base_offset = buf.read_i64()?;
        let batch_length = buf.read_i32()?;
        if batch_length < HEADER_AFTER_LENGTH as i32 {
            return Err(ThorwireError::Decoding(format!(
                "record batch length {} below header size",
                batch_length
            )));
        }
        let mut batch = buf.read_region(batch_length as usize)?;

        let partition_leader_epoch = batch.read_i32()?;
        let magic = batch.read_i8()?;
        if magic != RECORD_BATCH_MAGIC {
            return Err(ThorwireError::Decoding(format!(
                "unsupported record batch magic {}",
                magic
            )));
        }
        let expected_crc = batch.read_u32()?;
        let actual_crc = crc32c::crc32c(batch.as_slice());
        if expected_crc != actual_crc {
            return Err(ThorwireError::Decoding(format!(
                "record batch crc mismatch: expected {:#010x}, computed {:#010x}",
                expected_crc, actual_crc
            )));
        }

        let attributes = batch.read_i16()?;
        let compression = Compression::from_attributes(attributes)?;
        let last_offset_delta = batch.read_i32()?;
        let base_timestamp = batch.read_i64()?;
        let max_timestamp = batch.read_i64()?;
        let producer_id = batch.read_i64()?;
        let producer_epoch = batch.read_i16()?;
        let base_sequence = batch.read_i32()?;
        let records = CompressedRecords::deserialize(&mut batch, compression).await?;
        if !batch.is_empty() {
            return Err(ThorwireError::Decoding(format!(
                "{} trailing bytes in record batch",
                batch.remaining()
            )));
        }

        Ok(Self {
            base_offset,
            partition_leader_epoch,
            attributes: attributes & !COMPRESSION_MASK,
            last_offset_delta,
            base_timestamp,
            max_timestamp,
            producer_id,
            producer_epoch,
            base_sequence,
            records,
        })
    }
}

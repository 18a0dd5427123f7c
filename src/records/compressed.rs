//! Compressed record sets: `Array<Record>` run through a [`Compression`] codec and
//! written as an int32-length-prefixed region.

use crate::error::{Result, ThorwireError};
use crate::protocol::buffer::{ReadBuffer, WriteBuffer};
use crate::protocol::codec::{read_array_with, write_array_with, Decode, Encode, KafkaBytes};
use crate::records::compression::Compression;
use crate::records::record::Record;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompressedRecords {
    pub records: Vec<Record>,
    pub compression: Compression,
}

impl CompressedRecords {
    pub fn new(records: Vec<Record>, compression: Compression) -> Self {
        Self {
            records,
            compression,
        }
    }

    /// Encode the records, compress them and append the length-prefixed region.
    /// `buf` is incomplete until this resolves.
    pub async fn serialize(&self, buf: &mut WriteBuffer) -> Result<()> {
        let mut plain = WriteBuffer::new();
        write_array_with(&mut plain, Some(self.records.as_slice()), |record, buf| {
            record.encode(buf)
        })?;
        let plain_len = plain.len();
        let compressed = self.compression.compress(plain.freeze()).await?;
        debug!(
            codec = %self.compression,
            records = self.records.len(),
            plain_len,
            compressed_len = compressed.len(),
            "compressed record set"
        );
        buf.write(&KafkaBytes(compressed))
    }

    /// Read the length-prefixed region, decompress it with `compression` and parse
    /// the records. The region must hold exactly one record array.
    pub async fn deserialize(buf: &mut ReadBuffer, compression: Compression) -> Result<Self> {
        let region = buf.read::<KafkaBytes>()?.0;
        let plain = compression.decompress(region).await?;
        let mut plain = ReadBuffer::new(plain);
        let records = read_array_with(&mut plain, Record::decode)?
            .ok_or_else(|| ThorwireError::Decoding("null record array".into()))?;
        if !plain.is_empty() {
            return Err(ThorwireError::Decoding(format!(
                "{} trailing bytes after {} records",
                plain.remaining(),
                records.len()
            )));
        }
        Ok(Self {
            records,
            compression,
        })
    }
}

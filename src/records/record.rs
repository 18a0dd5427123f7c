//! Individual log records.
//!
//! Layout: attributes (int8), offset delta (varint), timestamp delta (varlong),
//! key and value (varint length, -1 = absent), headers (compact array of
//! varint-length key string and varint-length value).

use crate::error::{Result, ThorwireError};
use crate::protocol::buffer::{ReadBuffer, WriteBuffer};
use crate::protocol::codec::{
    read_compact_array_with, write_compact_array_with, Decode, Encode, VarInt, VarIntBytes,
    VarLong,
};
use bytes::Bytes;

/// Record header (key/value pair).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordHeader {
    pub key: String,
    pub value: Option<Bytes>,
}

impl RecordHeader {
    pub fn new(key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }
}

impl Encode for RecordHeader {
    fn encode(&self, buf: &mut WriteBuffer) -> Result<()> {
        buf.write(&VarIntBytes(Some(Bytes::copy_from_slice(self.key.as_bytes()))))?;
        buf.write(&VarIntBytes(self.value.clone()))
    }
}

impl Decode for RecordHeader {
    fn decode(buf: &mut ReadBuffer) -> Result<Self> {
        let key = buf
            .read::<VarIntBytes>()?
            .0
            .ok_or_else(|| ThorwireError::Decoding("null record header key".into()))?;
        let key = String::from_utf8(key.to_vec())
            .map_err(|e| ThorwireError::Decoding(format!("record header key: {}", e)))?;
        let value = buf.read::<VarIntBytes>()?.0;
        Ok(Self { key, value })
    }
}

/// One log entry. Offsets and timestamps are deltas from the batch base values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    pub attributes: i8,
    pub offset_delta: i32,
    pub timestamp_delta: i64,
    pub key: Option<Bytes>,
    pub value: Option<Bytes>,
    pub headers: Vec<RecordHeader>,
}

impl Record {
    pub fn new(value: impl Into<Bytes>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<Bytes>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_deltas(mut self, offset_delta: i32, timestamp_delta: i64) -> Self {
        self.offset_delta = offset_delta;
        self.timestamp_delta = timestamp_delta;
        self
    }

    pub fn with_headers(mut self, headers: Vec<RecordHeader>) -> Self {
        self.headers = headers;
        self
    }
}

impl Encode for Record {
    fn encode(&self, buf: &mut WriteBuffer) -> Result<()> {
        buf.put_i8(self.attributes);
        buf.write(&VarInt(self.offset_delta))?;
        buf.write(&VarLong(self.timestamp_delta))?;
        buf.write(&VarIntBytes(self.key.clone()))?;
        buf.write(&VarIntBytes(self.value.clone()))?;
        write_compact_array_with(buf, Some(self.headers.as_slice()), |header, buf| {
            header.encode(buf)
        })
    }
}

impl Decode for Record {
    fn decode(buf: &mut ReadBuffer) -> Result<Self> {
        let attributes = buf.read_i8()?;
        let offset_delta = buf.read::<VarInt>()?.0;
        let timestamp_delta = buf.read::<VarLong>()?.0;
        let key = buf.read::<VarIntBytes>()?.0;
        let value = buf.read::<VarIntBytes>()?.0;
        let headers = read_compact_array_with(buf, RecordHeader::decode)?.unwrap_or_default();
        Ok(Self {
            attributes,
            offset_delta,
            timestamp_delta,
            key,
            value,
            headers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_wire_layout() {
        let record = Record::new(Bytes::from_static(b"v"))
            .with_deltas(1, -1)
            .with_headers(vec![RecordHeader::new("h", Bytes::from_static(b"x"))]);
        let mut buf = WriteBuffer::new();
        buf.write(&record).unwrap();
        assert_eq!(
            buf.as_slice(),
            &[
                0x00, // attributes
                0x02, // offset delta 1
                0x01, // timestamp delta -1
                0x01, // null key
                0x02, b'v', // value
                0x02, // one header
                0x02, b'h', 0x02, b'x',
            ]
        );

        let mut read = ReadBuffer::new(buf.freeze());
        assert_eq!(read.read::<Record>().unwrap(), record);
        assert!(read.is_empty());
    }

    #[test]
    fn truncated_record_fails() {
        let mut read = ReadBuffer::new(vec![0x00u8, 0x02, 0x01, 0x01, 0x0a, b'v']);
        assert!(matches!(
            Record::decode(&mut read),
            Err(ThorwireError::Decoding(_))
        ));
    }

    #[test]
    fn null_header_key_fails() {
        let mut read = ReadBuffer::new(vec![0x01u8, 0x01]);
        assert!(RecordHeader::decode(&mut read).is_err());
    }
}

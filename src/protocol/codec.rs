//! Primitive wire types (fixed-width ints, varints, strings, bytes, arrays, tagged fields).
//!
//! Fixed-width integers map straight onto Rust integers. Encodings that share a
//! Rust representation but differ on the wire (a string can be i16-prefixed,
//! compact, nullable, ...) get a newtype so the wire form is chosen by type.

use crate::error::{Result, ThorwireError};
use crate::protocol::buffer::{ReadBuffer, WriteBuffer};
use bytes::Bytes;
use std::collections::BTreeMap;

/// Append a value's canonical wire bytes.
pub trait Encode {
    fn encode(&self, buf: &mut WriteBuffer) -> Result<()>;
}

/// Consume exactly the bytes a value needs.
pub trait Decode: Sized {
    fn decode(buf: &mut ReadBuffer) -> Result<Self>;
}

macro_rules! fixed_width {
    ($ty:ty, $put:ident, $read:ident) => {
        impl Encode for $ty {
            fn encode(&self, buf: &mut WriteBuffer) -> Result<()> {
                buf.$put(*self);
                Ok(())
            }
        }

        impl Decode for $ty {
            fn decode(buf: &mut ReadBuffer) -> Result<Self> {
                buf.$read()
            }
        }
    };
}

fixed_width!(i8, put_i8, read_i8);
fixed_width!(i16, put_i16, read_i16);
fixed_width!(i32, put_i32, read_i32);
fixed_width!(u32, put_u32, read_u32);
fixed_width!(i64, put_i64, read_i64);

impl Encode for bool {
    fn encode(&self, buf: &mut WriteBuffer) -> Result<()> {
        buf.put_u8(u8::from(*self));
        Ok(())
    }
}

impl Decode for bool {
    fn decode(buf: &mut ReadBuffer) -> Result<Self> {
        match buf.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ThorwireError::Decoding(format!(
                "invalid boolean value: {}",
                other
            ))),
        }
    }
}

// ---- varints ----

fn zigzag_encode_i32(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

fn zigzag_decode_i32(value: u32) -> i32 {
    ((value >> 1) as i32) ^ (-((value & 1) as i32))
}

fn zigzag_encode_i64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

fn zigzag_decode_i64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ (-((value & 1) as i64))
}

fn put_unsigned_varint(buf: &mut WriteBuffer, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8(((value & 0x7f) as u8) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Read a 7-bit-group varint holding at most `bits` significant bits.
fn read_unsigned_varint(buf: &mut ReadBuffer, bits: u32) -> Result<u64> {
    let max_bytes = bits.div_ceil(7);
    let mut value = 0u64;
    for i in 0..max_bytes {
        let byte = buf.read_u8()?;
        let shift = 7 * i;
        let payload = u64::from(byte & 0x7f);
        if bits - shift < 7 && payload >> (bits - shift) != 0 {
            return Err(ThorwireError::Decoding(format!(
                "varint overflows {} bits",
                bits
            )));
        }
        value |= payload << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(ThorwireError::Decoding(format!(
        "varint longer than {} bytes",
        max_bytes
    )))
}

/// Zig-zag encoded 32-bit varint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct VarInt(pub i32);

/// Zig-zag encoded 64-bit varint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct VarLong(pub i64);

/// Plain (non zig-zag) unsigned varint, used for compact lengths and tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct UnsignedVarInt(pub u32);

impl Encode for VarInt {
    fn encode(&self, buf: &mut WriteBuffer) -> Result<()> {
        put_unsigned_varint(buf, u64::from(zigzag_encode_i32(self.0)));
        Ok(())
    }
}

impl Decode for VarInt {
    fn decode(buf: &mut ReadBuffer) -> Result<Self> {
        let raw = read_unsigned_varint(buf, 32)? as u32;
        Ok(Self(zigzag_decode_i32(raw)))
    }
}

impl Encode for VarLong {
    fn encode(&self, buf: &mut WriteBuffer) -> Result<()> {
        put_unsigned_varint(buf, zigzag_encode_i64(self.0));
        Ok(())
    }
}

impl Decode for VarLong {
    fn decode(buf: &mut ReadBuffer) -> Result<Self> {
        let raw = read_unsigned_varint(buf, 64)?;
        Ok(Self(zigzag_decode_i64(raw)))
    }
}

impl Encode for UnsignedVarInt {
    fn encode(&self, buf: &mut WriteBuffer) -> Result<()> {
        put_unsigned_varint(buf, u64::from(self.0));
        Ok(())
    }
}

impl Decode for UnsignedVarInt {
    fn decode(buf: &mut ReadBuffer) -> Result<Self> {
        Ok(Self(read_unsigned_varint(buf, 32)? as u32))
    }
}

// ---- length helpers ----

fn i16_len(len: usize, what: &str) -> Result<i16> {
    i16::try_from(len).map_err(|_| ThorwireError::Encoding(format!("{} too long: {}", what, len)))
}

fn i32_len(len: usize, what: &str) -> Result<i32> {
    i32::try_from(len).map_err(|_| ThorwireError::Encoding(format!("{} too long: {}", what, len)))
}

/// Compact length: unsigned varint of `len + 1`, 0 meaning null.
fn put_compact_len(buf: &mut WriteBuffer, len: Option<usize>, what: &str) -> Result<()> {
    let raw = match len {
        None => 0,
        Some(n) => u32::try_from(n)
            .ok()
            .and_then(|n| n.checked_add(1))
            .ok_or_else(|| ThorwireError::Encoding(format!("{} too long: {}", what, n)))?,
    };
    UnsignedVarInt(raw).encode(buf)
}

fn read_compact_len(buf: &mut ReadBuffer) -> Result<Option<usize>> {
    match UnsignedVarInt::decode(buf)?.0 {
        0 => Ok(None),
        n => Ok(Some((n - 1) as usize)),
    }
}

/// Signed length where -1 means null and anything below is malformed.
fn checked_signed_len(len: i64, what: &str) -> Result<Option<usize>> {
    match len {
        -1 => Ok(None),
        n if n < -1 => Err(ThorwireError::Decoding(format!(
            "invalid {} length: {}",
            what, n
        ))),
        n => Ok(Some(n as usize)),
    }
}

fn utf8(bytes: Bytes) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| ThorwireError::Decoding(format!("invalid UTF-8 string: {}", e)))
}

fn non_null<T>(value: Option<T>, what: &str) -> Result<T> {
    value.ok_or_else(|| ThorwireError::Decoding(format!("null {} where non-null required", what)))
}

// ---- strings ----

/// Non-nullable string with an int16 length.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KafkaString(pub String);

/// Int16-length string, -1 meaning null.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NullableString(pub Option<String>);

/// Compact (varint length + 1) non-nullable string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CompactString(pub String);

/// Compact string where a zero length prefix means null.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CompactNullableString(pub Option<String>);

fn put_nullable_string(buf: &mut WriteBuffer, value: Option<&str>) -> Result<()> {
    match value {
        None => buf.put_i16(-1),
        Some(s) => {
            buf.put_i16(i16_len(s.len(), "string")?);
            buf.put_slice(s.as_bytes());
        }
    }
    Ok(())
}

fn read_nullable_string(buf: &mut ReadBuffer) -> Result<Option<String>> {
    match checked_signed_len(i64::from(buf.read_i16()?), "string")? {
        None => Ok(None),
        Some(n) => buf.read_bytes(n).and_then(utf8).map(Some),
    }
}

fn put_compact_string(buf: &mut WriteBuffer, value: Option<&str>) -> Result<()> {
    put_compact_len(buf, value.map(str::len), "compact string")?;
    if let Some(s) = value {
        buf.put_slice(s.as_bytes());
    }
    Ok(())
}

fn read_compact_string(buf: &mut ReadBuffer) -> Result<Option<String>> {
    match read_compact_len(buf)? {
        None => Ok(None),
        Some(n) => buf.read_bytes(n).and_then(utf8).map(Some),
    }
}

impl Encode for KafkaString {
    fn encode(&self, buf: &mut WriteBuffer) -> Result<()> {
        put_nullable_string(buf, Some(&self.0))
    }
}

impl Decode for KafkaString {
    fn decode(buf: &mut ReadBuffer) -> Result<Self> {
        read_nullable_string(buf).and_then(|s| non_null(s, "string")).map(Self)
    }
}

impl Encode for NullableString {
    fn encode(&self, buf: &mut WriteBuffer) -> Result<()> {
        put_nullable_string(buf, self.0.as_deref())
    }
}

impl Decode for NullableString {
    fn decode(buf: &mut ReadBuffer) -> Result<Self> {
        read_nullable_string(buf).map(Self)
    }
}

impl Encode for CompactString {
    fn encode(&self, buf: &mut WriteBuffer) -> Result<()> {
        put_compact_string(buf, Some(&self.0))
    }
}

impl Decode for CompactString {
    fn decode(buf: &mut ReadBuffer) -> Result<Self> {
        read_compact_string(buf)
            .and_then(|s| non_null(s, "compact string"))
            .map(Self)
    }
}

impl Encode for CompactNullableString {
    fn encode(&self, buf: &mut WriteBuffer) -> Result<()> {
        put_compact_string(buf, self.0.as_deref())
    }
}

impl Decode for CompactNullableString {
    fn decode(buf: &mut ReadBuffer) -> Result<Self> {
        read_compact_string(buf).map(Self)
    }
}

// ---- byte arrays ----

/// Non-nullable bytes with an int32 length.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KafkaBytes(pub Bytes);

/// Int32-length bytes, -1 meaning null.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NullableBytes(pub Option<Bytes>);

/// Compact (varint length + 1) non-nullable bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CompactBytes(pub Bytes);

/// Compact bytes where a zero length prefix means null.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CompactNullableBytes(pub Option<Bytes>);

/// Zig-zag varint length followed by the payload, -1 meaning absent.
/// This is how record keys, values and header values are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VarIntBytes(pub Option<Bytes>);

impl VarIntBytes {
    pub fn from_static(bytes: &'static [u8]) -> Self {
        Self(Some(Bytes::from_static(bytes)))
    }
}

fn put_nullable_bytes(buf: &mut WriteBuffer, value: Option<&Bytes>) -> Result<()> {
    match value {
        None => buf.put_i32(-1),
        Some(b) => {
            buf.put_i32(i32_len(b.len(), "bytes")?);
            buf.put_slice(b);
        }
    }
    Ok(())
}

fn read_nullable_bytes(buf: &mut ReadBuffer) -> Result<Option<Bytes>> {
    match checked_signed_len(i64::from(buf.read_i32()?), "bytes")? {
        None => Ok(None),
        Some(n) => buf.read_bytes(n).map(Some),
    }
}

fn put_compact_bytes(buf: &mut WriteBuffer, value: Option<&Bytes>) -> Result<()> {
    put_compact_len(buf, value.map(Bytes::len), "compact bytes")?;
    if let Some(b) = value {
        buf.put_slice(b);
    }
    Ok(())
}

fn read_compact_bytes(buf: &mut ReadBuffer) -> Result<Option<Bytes>> {
    match read_compact_len(buf)? {
        None => Ok(None),
        Some(n) => buf.read_bytes(n).map(Some),
    }
}

impl Encode for KafkaBytes {
    fn encode(&self, buf: &mut WriteBuffer) -> Result<()> {
        put_nullable_bytes(buf, Some(&self.0))
    }
}

impl Decode for KafkaBytes {
    fn decode(buf: &mut ReadBuffer) -> Result<Self> {
        read_nullable_bytes(buf).and_then(|b| non_null(b, "bytes")).map(Self)
    }
}

impl Encode for NullableBytes {
    fn encode(&self, buf: &mut WriteBuffer) -> Result<()> {
        put_nullable_bytes(buf, self.0.as_ref())
    }
}

impl Decode for NullableBytes {
    fn decode(buf: &mut ReadBuffer) -> Result<Self> {
        read_nullable_bytes(buf).map(Self)
    }
}

impl Encode for CompactBytes {
    fn encode(&self, buf: &mut WriteBuffer) -> Result<()> {
        put_compact_bytes(buf, Some(&self.0))
    }
}

impl Decode for CompactBytes {
    fn decode(buf: &mut ReadBuffer) -> Result<Self> {
        read_compact_bytes(buf)
            .and_then(|b| non_null(b, "compact bytes"))
            .map(Self)
    }
}

impl Encode for CompactNullableBytes {
    fn encode(&self, buf: &mut WriteBuffer) -> Result<()> {
        put_compact_bytes(buf, self.0.as_ref())
    }
}

impl Decode for CompactNullableBytes {
    fn decode(buf: &mut ReadBuffer) -> Result<Self> {
        read_compact_bytes(buf).map(Self)
    }
}

impl Encode for VarIntBytes {
    fn encode(&self, buf: &mut WriteBuffer) -> Result<()> {
        match &self.0 {
            None => VarInt(-1).encode(buf),
            Some(b) => {
                VarInt(i32_len(b.len(), "varint bytes")?).encode(buf)?;
                buf.put_slice(b);
                Ok(())
            }
        }
    }
}

impl Decode for VarIntBytes {
    fn decode(buf: &mut ReadBuffer) -> Result<Self> {
        let len = VarInt::decode(buf)?.0;
        match checked_signed_len(i64::from(len), "varint bytes")? {
            None => Ok(Self(None)),
            Some(n) => buf.read_bytes(n).map(|b| Self(Some(b))),
        }
    }
}

// ---- arrays ----

/// Int32-count array, -1 meaning null. Elements use their own codec.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Array<T>(pub Option<Vec<T>>);

/// Compact (varint count + 1) array, 0 meaning null.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompactArray<T>(pub Option<Vec<T>>);

impl<T> Default for Array<T> {
    fn default() -> Self {
        Self(Some(Vec::new()))
    }
}

impl<T> Default for CompactArray<T> {
    fn default() -> Self {
        Self(Some(Vec::new()))
    }
}

impl<T> Array<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self(Some(items))
    }

    pub fn null() -> Self {
        Self(None)
    }

    /// Elements, treating null as empty.
    pub fn items(&self) -> &[T] {
        self.0.as_deref().unwrap_or_default()
    }
}

impl<T> CompactArray<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self(Some(items))
    }

    pub fn null() -> Self {
        Self(None)
    }

    pub fn items(&self) -> &[T] {
        self.0.as_deref().unwrap_or_default()
    }
}

/// Write an int32-count array, delegating each element to `write_item`.
pub fn write_array_with<T>(
    buf: &mut WriteBuffer,
    items: Option<&[T]>,
    mut write_item: impl FnMut(&T, &mut WriteBuffer) -> Result<()>,
) -> Result<()> {
    match items {
        None => buf.put_i32(-1),
        Some(items) => {
            buf.put_i32(i32_len(items.len(), "array")?);
            for item in items {
                write_item(item, buf)?;
            }
        }
    }
    Ok(())
}

/// Read an int32-count array, delegating each element to `read_item`.
pub fn read_array_with<T>(
    buf: &mut ReadBuffer,
    read_item: impl FnMut(&mut ReadBuffer) -> Result<T>,
) -> Result<Option<Vec<T>>> {
    let count = checked_signed_len(i64::from(buf.read_i32()?), "array")?;
    read_items(buf, count, read_item)
}

/// Write a compact array, delegating each element to `write_item`.
pub fn write_compact_array_with<T>(
    buf: &mut WriteBuffer,
    items: Option<&[T]>,
    mut write_item: impl FnMut(&T, &mut WriteBuffer) -> Result<()>,
) -> Result<()> {
    put_compact_len(buf, items.map(<[T]>::len), "compact array")?;
    for item in items.unwrap_or_default() {
        write_item(item, buf)?;
    }
    Ok(())
}

/// Read a compact array, delegating each element to `read_item`.
pub fn read_compact_array_with<T>(
    buf: &mut ReadBuffer,
    read_item: impl FnMut(&mut ReadBuffer) -> Result<T>,
) -> Result<Option<Vec<T>>> {
    let count = read_compact_len(buf)?;
    read_items(buf, count, read_item)
}

fn read_items<T>(
    buf: &mut ReadBuffer,
    count: Option<usize>,
    mut read_item: impl FnMut(&mut ReadBuffer) -> Result<T>,
) -> Result<Option<Vec<T>>> {
    let Some(count) = count else {
        return Ok(None);
    };
    // Every element occupies at least one byte; cap the allocation accordingly.
    let mut items = Vec::with_capacity(count.min(buf.remaining()));
    for _ in 0..count {
        items.push(read_item(buf)?);
    }
    Ok(Some(items))
}

impl<T: Encode> Encode for Array<T> {
    fn encode(&self, buf: &mut WriteBuffer) -> Result<()> {
        write_array_with(buf, self.0.as_deref(), |item, buf| item.encode(buf))
    }
}

impl<T: Decode> Decode for Array<T> {
    fn decode(buf: &mut ReadBuffer) -> Result<Self> {
        read_array_with(buf, T::decode).map(Self)
    }
}

impl<T: Encode> Encode for CompactArray<T> {
    fn encode(&self, buf: &mut WriteBuffer) -> Result<()> {
        write_compact_array_with(buf, self.0.as_deref(), |item, buf| item.encode(buf))
    }
}

impl<T: Decode> Decode for CompactArray<T> {
    fn decode(buf: &mut ReadBuffer) -> Result<Self> {
        read_compact_array_with(buf, T::decode).map(Self)
    }
}

// ---- tagged fields ----

/// Tagged field section of flexible message versions: tag -> raw payload.
/// Tags are written in ascending order; decoding rejects unordered or repeated tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TaggedFields(pub BTreeMap<u32, Bytes>);

impl TaggedFields {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Encode for TaggedFields {
    fn encode(&self, buf: &mut WriteBuffer) -> Result<()> {
        let count = u32::try_from(self.0.len())
            .map_err(|_| ThorwireError::Encoding("too many tagged fields".into()))?;
        UnsignedVarInt(count).encode(buf)?;
        for (tag, payload) in &self.0 {
            UnsignedVarInt(*tag).encode(buf)?;
            let size = u32::try_from(payload.len())
                .map_err(|_| ThorwireError::Encoding("tagged field too long".into()))?;
            UnsignedVarInt(size).encode(buf)?;
            buf.put_slice(payload);
        }
        Ok(())
    }
}

impl Decode for TaggedFields {
    fn decode(buf: &mut ReadBuffer) -> Result<Self> {
        let count = UnsignedVarInt::decode(buf)?.0;
        let mut fields = BTreeMap::new();
        let mut last_tag: Option<u32> = None;
        for _ in 0..count {
            let tag = UnsignedVarInt::decode(buf)?.0;
            if last_tag.is_some_and(|last| tag <= last) {
                return Err(ThorwireError::Decoding(format!(
                    "tagged field {} out of order",
                    tag
                )));
            }
            last_tag = Some(tag);
            let size = UnsignedVarInt::decode(buf)?.0 as usize;
            fields.insert(tag, buf.read_bytes(size)?);
        }
        Ok(Self(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode<T: Encode>(value: &T) -> Vec<u8> {
        let mut buf = WriteBuffer::new();
        buf.write(value).unwrap();
        buf.as_slice().to_vec()
    }

    fn roundtrip<T: Encode + Decode + PartialEq + std::fmt::Debug>(value: T) {
        let bytes = encode(&value);
        let mut read = ReadBuffer::new(bytes);
        let decoded: T = read.read().unwrap();
        assert_eq!(decoded, value);
        assert!(read.is_empty(), "decoder left {} bytes", read.remaining());
    }

    #[test]
    fn varint_known_vectors() {
        let vectors: &[(i32, &[u8])] = &[
            (0, &[0x00]),
            (-1, &[0x01]),
            (1, &[0x02]),
            (63, &[0x7e]),
            (-64, &[0x7f]),
            (64, &[0x80, 0x01]),
            (-65, &[0x81, 0x01]),
            (i32::MAX, &[0xfe, 0xff, 0xff, 0xff, 0x0f]),
            (i32::MIN, &[0xff, 0xff, 0xff, 0xff, 0x0f]),
        ];
        for (value, expected) in vectors {
            assert_eq!(&encode(&VarInt(*value)), expected, "varint {}", value);
        }
    }

    #[test]
    fn varint_and_varlong_roundtrip() {
        for value in [0, 1, -1, 63, -64, 8192, -8192, i32::MIN, i32::MAX] {
            roundtrip(VarInt(value));
        }
        for value in [0, 1, -1, 1 << 40, -(1 << 40), i64::MIN, i64::MAX] {
            roundtrip(VarLong(value));
        }
        for value in [0, 1, 127, 128, u32::MAX] {
            roundtrip(UnsignedVarInt(value));
        }
    }

    #[test]
    fn truncated_varint_fails() {
        let mut read = ReadBuffer::new(vec![0x80u8, 0x80]);
        assert!(matches!(
            VarInt::decode(&mut read),
            Err(ThorwireError::Decoding(_))
        ));
    }

    #[test]
    fn overlong_varints_fail() {
        let mut read = ReadBuffer::new(vec![0xffu8, 0xff, 0xff, 0xff, 0xff, 0x01]);
        assert!(VarInt::decode(&mut read).is_err());

        let mut read = ReadBuffer::new(vec![0xffu8, 0xff, 0xff, 0xff, 0x1f]);
        assert!(VarInt::decode(&mut read).is_err(), "bits beyond 32 must be rejected");

        let mut read = ReadBuffer::new(vec![0xffu8; 11]);
        assert!(VarLong::decode(&mut read).is_err());
    }

    #[test]
    fn strings_roundtrip_and_encode_nulls() {
        roundtrip(KafkaString("client".into()));
        roundtrip(NullableString(Some("".into())));
        roundtrip(NullableString(None));
        roundtrip(CompactString("thorwire".into()));
        roundtrip(CompactNullableString(Some("x".into())));
        roundtrip(CompactNullableString(None));

        assert_eq!(encode(&NullableString(None)), vec![0xff, 0xff]);
        assert_eq!(encode(&CompactNullableString(None)), vec![0x00]);
        assert_eq!(encode(&CompactString("ab".into())), vec![0x03, b'a', b'b']);
        assert_eq!(encode(&KafkaString("ab".into())), vec![0x00, 0x02, b'a', b'b']);
    }

    #[test]
    fn null_where_non_null_required_fails() {
        let mut read = ReadBuffer::new(vec![0xffu8, 0xff]);
        assert!(KafkaString::decode(&mut read).is_err());
        let mut read = ReadBuffer::new(vec![0x00u8]);
        assert!(CompactString::decode(&mut read).is_err());
    }

    #[test]
    fn string_longer_than_buffer_fails() {
        let mut read = ReadBuffer::new(vec![0x00u8, 0x05, b'a', b'b']);
        assert!(matches!(
            NullableString::decode(&mut read),
            Err(ThorwireError::Decoding(_))
        ));
        let mut read = ReadBuffer::new(vec![0x06u8, b'a']);
        assert!(CompactString::decode(&mut read).is_err());
    }

    #[test]
    fn invalid_utf8_fails() {
        let mut read = ReadBuffer::new(vec![0x00u8, 0x02, 0xc3, 0x28]);
        assert!(KafkaString::decode(&mut read).is_err());
    }

    #[test]
    fn bytes_roundtrip() {
        roundtrip(KafkaBytes(Bytes::from_static(b"payload")));
        roundtrip(NullableBytes(None));
        roundtrip(CompactBytes(Bytes::new()));
        roundtrip(CompactNullableBytes(None));
        roundtrip(VarIntBytes::from_static(b"key"));
        roundtrip(VarIntBytes(None));
        assert_eq!(encode(&VarIntBytes(None)), vec![0x01]);
        assert_eq!(encode(&VarIntBytes::from_static(b"k")), vec![0x02, b'k']);
    }

    #[test]
    fn negative_length_below_null_sentinel_fails() {
        let mut read = ReadBuffer::new(encode(&VarInt(-2)));
        assert!(VarIntBytes::decode(&mut read).is_err());
        let mut read = ReadBuffer::new(vec![0xffu8, 0xff, 0xff, 0xfe]);
        assert!(NullableBytes::decode(&mut read).is_err());
    }

    #[test]
    fn arrays_roundtrip_and_encode_counts() {
        roundtrip(Array::new(vec![1i32, 2, 3]));
        roundtrip(Array::<i32>::null());
        roundtrip(CompactArray::new(vec![CompactString("a".into())]));
        roundtrip(CompactArray::<i16>::null());
        roundtrip(Array::new(vec![Array::new(vec![VarInt(-5)])]));

        assert_eq!(encode(&Array::<i8>::null()), vec![0xff, 0xff, 0xff, 0xff]);
        assert_eq!(encode(&CompactArray::new(vec![7i8])), vec![0x02, 0x07]);
        assert_eq!(encode(&CompactArray::<i8>::null()), vec![0x00]);
    }

    #[test]
    fn array_helpers_use_caller_supplied_element_codec() {
        let mut buf = WriteBuffer::new();
        write_array_with(&mut buf, Some(&[1u8, 2, 3][..]), |item, buf| {
            buf.put_i16(i16::from(*item) * 10);
            Ok(())
        })
        .unwrap();
        let mut read = ReadBuffer::new(buf.freeze());
        let items = read_array_with(&mut read, |buf| buf.read_i16()).unwrap();
        assert_eq!(items, Some(vec![10, 20, 30]));
    }

    #[test]
    fn array_count_past_end_fails() {
        let mut read = ReadBuffer::new(vec![0x00u8, 0x00, 0x00, 0x03, 0x00, 0x01]);
        assert!(Array::<i16>::decode(&mut read).is_err());
    }

    #[test]
    fn tagged_fields_roundtrip_and_reject_disorder() {
        let mut fields = BTreeMap::new();
        fields.insert(0, Bytes::from_static(b"zero"));
        fields.insert(3, Bytes::from_static(b"three"));
        roundtrip(TaggedFields(fields));
        roundtrip(TaggedFields::default());
        assert_eq!(encode(&TaggedFields::default()), vec![0x00]);

        let mut read = ReadBuffer::new(vec![0x02u8, 0x05, 0x00, 0x01, 0x00]);
        assert!(TaggedFields::decode(&mut read).is_err());
    }

    #[test]
    fn boolean_rejects_other_values() {
        roundtrip(true);
        roundtrip(false);
        let mut read = ReadBuffer::new(vec![2u8]);
        assert!(bool::decode(&mut read).is_err());
    }
}

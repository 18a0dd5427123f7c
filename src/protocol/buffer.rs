//! Read and write cursors over `bytes` storage.
//!
//! Fixed-width values are big-endian. Every read is bounds-checked: asking for
//! more bytes than remain yields [`ThorwireError::Decoding`] and leaves the
//! cursor where it was.

use crate::error::{Result, ThorwireError};
use crate::protocol::codec::{Decode, Encode};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Read cursor over an immutable byte sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadBuffer {
    inner: Bytes,
}

impl ReadBuffer {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            inner: bytes.into(),
        }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Decode one `T` and advance past it.
    pub fn read<T: Decode>(&mut self) -> Result<T> {
        T::decode(self)
    }

    fn ensure(&self, what: &str, needed: usize) -> Result<()> {
        if self.inner.len() < needed {
            return Err(ThorwireError::truncated(what, needed, self.inner.len()));
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure("u8", 1)?;
        Ok(self.inner.get_u8())
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        self.ensure("int8", 1)?;
        Ok(self.inner.get_i8())
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.ensure("int16", 2)?;
        Ok(self.inner.get_i16())
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.ensure("int32", 4)?;
        Ok(self.inner.get_i32())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure("uint32", 4)?;
        Ok(self.inner.get_u32())
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.ensure("int64", 8)?;
        Ok(self.inner.get_i64())
    }

    /// Split off the next `len` bytes without copying.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        self.ensure("byte payload", len)?;
        Ok(self.inner.split_to(len))
    }

    /// Split off the next `len` bytes as an independent cursor.
    pub fn read_region(&mut self, len: usize) -> Result<ReadBuffer> {
        self.read_bytes(len).map(ReadBuffer::new)
    }

    /// Unconsumed bytes, leaving the cursor untouched.
    pub fn as_slice(&self) -> &[u8] {
        &self.inner
    }

    /// Consume the cursor, returning whatever was not read.
    pub fn into_bytes(self) -> Bytes {
        self.inner
    }
}

impl From<Bytes> for ReadBuffer {
    fn from(bytes: Bytes) -> Self {
        Self::new(bytes)
    }
}

impl From<Vec<u8>> for ReadBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

/// Growable write buffer, exclusively owned until frozen.
#[derive(Debug, Clone, Default)]
pub struct WriteBuffer {
    inner: BytesMut,
}

impl WriteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: BytesMut::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Append the canonical wire form of `value`.
    pub fn write<T: Encode + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.encode(self)
    }

    pub fn put_u8(&mut self, value: u8) {
        self.inner.put_u8(value);
    }

    pub fn put_i8(&mut self, value: i8) {
        self.inner.put_i8(value);
    }

    pub fn put_i16(&mut self, value: i16) {
        self.inner.put_i16(value);
    }

    pub fn put_i32(&mut self, value: i32) {
        self.inner.put_i32(value);
    }

    pub fn put_u32(&mut self, value: u32) {
        self.inner.put_u32(value);
    }

    pub fn put_i64(&mut self, value: i64) {
        self.inner.put_i64(value);
    }

    pub fn put_slice(&mut self, bytes: &[u8]) {
        self.inner.put_slice(bytes);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.inner
    }

    /// Overwrite four bytes at `position` with `value` (big-endian).
    ///
    /// Used to back-fill length and checksum fields once the bytes they cover
    /// have been written.
    pub fn patch_i32(&mut self, position: usize, value: i32) -> Result<()> {
        self.patch(position, &value.to_be_bytes())
    }

    pub fn patch_u32(&mut self, position: usize, value: u32) -> Result<()> {
        self.patch(position, &value.to_be_bytes())
    }

    fn patch(&mut self, position: usize, bytes: &[u8]) -> Result<()> {
        let end = position + bytes.len();
        if end > self.inner.len() {
            return Err(ThorwireError::Encoding(format!(
                "patch at {}..{} beyond buffer of {} bytes",
                position,
                end,
                self.inner.len()
            )));
        }
        self.inner[position..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Materialize into an immutable byte sequence for transmission.
    pub fn freeze(self) -> Bytes {
        self.inner.freeze()
    }
}

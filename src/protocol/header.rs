//! Request/response headers and the traits that tie a request to its response codec.
//!
//! Request header v1: api_key, api_version, correlation_id, client_id (nullable string).
//! Request header v2 appends tagged fields (flexible versions).
//! Response header v0: correlation_id. Response header v1 appends tagged fields.

use crate::error::{Result, ThorwireError};
use crate::protocol::buffer::{ReadBuffer, WriteBuffer};
use crate::protocol::codec::{Decode, Encode, NullableString, TaggedFields};
use crate::types::VersionRange;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeader {
    pub api_key: i16,
    pub api_version: i16,
    pub correlation_id: i32,
    pub client_id: Option<String>,
    /// `Some` selects header v2.
    pub tagged_fields: Option<TaggedFields>,
}

impl RequestHeader {
    /// Header v1.
    pub fn v1(
        api_key: i16,
        api_version: i16,
        correlation_id: i32,
        client_id: Option<String>,
    ) -> Self {
        Self {
            api_key,
            api_version,
            correlation_id,
            client_id,
            tagged_fields: None,
        }
    }

    /// Header v2, used by flexible message versions.
    pub fn v2(
        api_key: i16,
        api_version: i16,
        correlation_id: i32,
        client_id: Option<String>,
    ) -> Self {
        Self {
            tagged_fields: Some(TaggedFields::default()),
            ..Self::v1(api_key, api_version, correlation_id, client_id)
        }
    }

    /// Read a request header. The caller decides the header version since it
    /// depends on the api key and version just read.
    pub fn decode(buf: &mut ReadBuffer, flexible: impl Fn(i16, i16) -> bool) -> Result<Self> {
        let api_key = buf.read_i16()?;
        let api_version = buf.read_i16()?;
        let correlation_id = buf.read_i32()?;
        let client_id = buf.read::<NullableString>()?.0;
        let tagged_fields = if flexible(api_key, api_version) {
            Some(buf.read::<TaggedFields>()?)
        } else {
            None
        };
        Ok(Self {
            api_key,
            api_version,
            correlation_id,
            client_id,
            tagged_fields,
        })
    }
}

impl Encode for RequestHeader {
    fn encode(&self, buf: &mut WriteBuffer) -> Result<()> {
        buf.put_i16(self.api_key);
        buf.put_i16(self.api_version);
        buf.put_i32(self.correlation_id);
        buf.write(&NullableString(self.client_id.clone()))?;
        if let Some(tagged) = &self.tagged_fields {
            buf.write(tagged)?;
        }
        Ok(())
    }
}

/// Decoded response header, exposing the correlation id used for matching.
pub trait ResponseHeader: Decode + Send + 'static {
    fn correlation_id(&self) -> i32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeaderV0 {
    pub correlation_id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHeaderV1 {
    pub correlation_id: i32,
    pub tagged_fields: TaggedFields,
}

impl Decode for ResponseHeaderV0 {
    fn decode(buf: &mut ReadBuffer) -> Result<Self> {
        Ok(Self {
            correlation_id: buf.read_i32()?,
        })
    }
}

impl Encode for ResponseHeaderV0 {
    fn encode(&self, buf: &mut WriteBuffer) -> Result<()> {
        buf.put_i32(self.correlation_id);
        Ok(())
    }
}

impl Decode for ResponseHeaderV1 {
    fn decode(buf: &mut ReadBuffer) -> Result<Self> {
        Ok(Self {
            correlation_id: buf.read_i32()?,
            tagged_fields: buf.read()?,
        })
    }
}

impl Encode for ResponseHeaderV1 {
    fn encode(&self, buf: &mut WriteBuffer) -> Result<()> {
        buf.put_i32(self.correlation_id);
        buf.write(&self.tagged_fields)
    }
}

impl ResponseHeader for ResponseHeaderV0 {
    fn correlation_id(&self) -> i32 {
        self.correlation_id
    }
}

impl ResponseHeader for ResponseHeaderV1 {
    fn correlation_id(&self) -> i32 {
        self.correlation_id
    }
}

/// An outbound message built at one concrete version.
///
/// The associated `ResponseHeader` type and `decode_response` are the
/// strategies the connection uses to read the matching response frame.
pub trait Request: Send + 'static {
    type ResponseHeader: ResponseHeader;
    type Response: Send + 'static;

    fn api_key(&self) -> i16;

    fn api_version(&self) -> i16;

    /// Header carrying the connection-assigned correlation id.
    fn header(&self, correlation_id: i32) -> RequestHeader;

    fn encode_body(&self, buf: &mut WriteBuffer) -> Result<()>;

    /// Decode the response body that follows the header.
    fn decode_response(&self, buf: &mut ReadBuffer) -> Result<Self::Response>;
}

/// Produces a [`Request`] once the negotiated version range is known.
pub trait RequestBuilder {
    type Request: Request;

    fn api_key(&self) -> i16;

    /// Versions this builder knows how to encode.
    fn supported_versions(&self) -> VersionRange;

    /// Build at a version inside `{min, max}`. `correlation_id` is the
    /// session-scoped sequence number; the id written on the wire is
    /// assigned by the connection.
    fn build(&self, correlation_id: i32, min: i16, max: i16) -> Result<Self::Request>;

    /// Highest version both sides support.
    fn select_version(&self, min: i16, max: i16) -> Result<i16> {
        let ours = self.supported_versions();
        ours.intersect(&VersionRange::new(min, max))
            .map(|range| range.max)
            .ok_or(ThorwireError::UnsupportedVersion {
                api_key: self.api_key(),
                min,
                max,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_header_v1_layout() {
        let mut buf = WriteBuffer::new();
        buf.write(&RequestHeader::v1(18, 3, 7, Some("ab".into())))
            .unwrap();
        assert_eq!(
            buf.as_slice(),
            &[0, 18, 0, 3, 0, 0, 0, 7, 0, 2, b'a', b'b']
        );
    }

    #[test]
    fn request_header_v2_appends_tagged_fields() {
        let mut buf = WriteBuffer::new();
        buf.write(&RequestHeader::v2(18, 3, 1, None)).unwrap();
        assert_eq!(buf.as_slice(), &[0, 18, 0, 3, 0, 0, 0, 1, 0xff, 0xff, 0]);

        let mut read = ReadBuffer::new(buf.freeze());
        let header = RequestHeader::decode(&mut read, |_, version| version >= 3).unwrap();
        assert_eq!(header, RequestHeader::v2(18, 3, 1, None));
        assert!(read.is_empty());
    }

    #[test]
    fn response_header_v1_reads_tagged_fields() {
        let mut read = ReadBuffer::new(vec![0u8, 0, 0, 9, 0, 0xaa]);
        let header: ResponseHeaderV1 = read.read().unwrap();
        assert_eq!(header.correlation_id(), 9);
        assert_eq!(read.as_slice(), &[0xaa]);
    }

    #[test]
    fn truncated_response_header_fails() {
        let mut read = ReadBuffer::new(vec![0u8, 0, 1]);
        assert!(ResponseHeaderV0::decode(&mut read).is_err());
    }
}

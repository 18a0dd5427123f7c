//! ApiVersions (key 18), versions 0-3.
//!
//! v0-v2 requests have an empty body; v3 adds compact client software name and
//! version plus tagged fields. Responses always use response header v0. A broker
//! that rejects the request version answers UNSUPPORTED_VERSION with the body in
//! the v0 layout.

use crate::error::Result;
use crate::protocol::buffer::{ReadBuffer, WriteBuffer};
use crate::protocol::codec::{
    read_array_with, read_compact_array_with, write_array_with, write_compact_array_with,
    CompactString, TaggedFields,
};
use crate::protocol::header::{Request, RequestBuilder, RequestHeader, ResponseHeaderV0};
use crate::types::{api_key, error_code, SupportedApiVersions, VersionRange};

/// Versions this crate can speak; also the bootstrap range of the handshake.
pub const API_VERSIONS_RANGE: VersionRange = VersionRange::new(0, 3);

const FIRST_FLEXIBLE_VERSION: i16 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiVersionsRequestBuilder {
    pub client_id: Option<String>,
    pub client_software_name: String,
    pub client_software_version: String,
}

impl ApiVersionsRequestBuilder {
    pub fn new(
        client_id: Option<String>,
        client_software_name: impl Into<String>,
        client_software_version: impl Into<String>,
    ) -> Self {
        Self {
            client_id,
            client_software_name: client_software_name.into(),
            client_software_version: client_software_version.into(),
        }
    }
}

impl RequestBuilder for ApiVersionsRequestBuilder {
    type Request = ApiVersionsRequest;

    fn api_key(&self) -> i16 {
        api_key::API_VERSIONS
    }

    fn supported_versions(&self) -> VersionRange {
        API_VERSIONS_RANGE
    }

    fn build(&self, _correlation_id: i32, min: i16, max: i16) -> Result<ApiVersionsRequest> {
        let version = self.select_version(min, max)?;
        Ok(ApiVersionsRequest {
            version,
            client_id: self.client_id.clone(),
            client_software_name: self.client_software_name.clone(),
            client_software_version: self.client_software_version.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiVersionsRequest {
    pub version: i16,
    pub client_id: Option<String>,
    pub client_software_name: String,
    pub client_software_version: String,
}

impl ApiVersionsRequest {
    /// Body decoder for broker-side use (tests, proxies).
    pub fn decode_body(buf: &mut ReadBuffer, version: i16) -> Result<(String, String)> {
        if version < FIRST_FLEXIBLE_VERSION {
            return Ok((String::new(), String::new()));
        }
        let name = buf.read::<CompactString>()?.0;
        let software_version = buf.read::<CompactString>()?.0;
        buf.read::<TaggedFields>()?;
        Ok((name, software_version))
    }
}

impl Request for ApiVersionsRequest {
    type ResponseHeader = ResponseHeaderV0;
    type Response = ApiVersionsResponse;

    fn api_key(&self) -> i16 {
        api_key::API_VERSIONS
    }

    fn api_version(&self) -> i16 {
        self.version
    }

    fn header(&self, correlation_id: i32) -> RequestHeader {
        let client_id = self.client_id.clone();
        if self.version >= FIRST_FLEXIBLE_VERSION {
            RequestHeader::v2(api_key::API_VERSIONS, self.version, correlation_id, client_id)
        } else {
            RequestHeader::v1(api_key::API_VERSIONS, self.version, correlation_id, client_id)
        }
    }

    fn encode_body(&self, buf: &mut WriteBuffer) -> Result<()> {
        if self.version >= FIRST_FLEXIBLE_VERSION {
            buf.write(&CompactString(self.client_software_name.clone()))?;
            buf.write(&CompactString(self.client_software_version.clone()))?;
            buf.write(&TaggedFields::default())?;
        }
        Ok(())
    }

    fn decode_response(&self, buf: &mut ReadBuffer) -> Result<ApiVersionsResponse> {
        ApiVersionsResponse::decode(buf, self.version)
    }
}

/// One supported API as reported by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiVersionKey {
    pub api_key: i16,
    pub min_version: i16,
    pub max_version: i16,
}

impl ApiVersionKey {
    pub fn new(api_key: i16, min_version: i16, max_version: i16) -> Self {
        Self {
            api_key,
            min_version,
            max_version,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApiVersionsResponse {
    pub error_code: i16,
    /// `None` when the broker sent a null array.
    pub api_keys: Option<Vec<ApiVersionKey>>,
    pub throttle_time_ms: i32,
    pub tagged_fields: TaggedFields,
}

impl ApiVersionsResponse {
    /// Decode a body written at `version`. An UNSUPPORTED_VERSION error code
    /// switches the rest of the body to the v0 layout.
    pub fn decode(buf: &mut ReadBuffer, version: i16) -> Result<Self> {
        let error_code = buf.read_i16()?;
        let layout = if error_code == error_code::UNSUPPORTED_VERSION {
            0
        } else {
            version
        };
        let flexible = layout >= FIRST_FLEXIBLE_VERSION;

        let api_keys = if flexible {
            read_compact_array_with(buf, |buf| {
                let key = read_key(buf)?;
                buf.read::<TaggedFields>()?;
                Ok(key)
            })?
        } else {
            read_array_with(buf, read_key)?
        };
        let throttle_time_ms = if layout >= 1 { buf.read_i32()? } else { 0 };
        let tagged_fields = if flexible {
            buf.read()?
        } else {
            TaggedFields::default()
        };

        Ok(Self {
            error_code,
            api_keys,
            throttle_time_ms,
            tagged_fields,
        })
    }

    /// Encode in the layout of `version` (broker side, tests).
    pub fn encode(&self, buf: &mut WriteBuffer, version: i16) -> Result<()> {
        buf.put_i16(self.error_code);
        let flexible = version >= FIRST_FLEXIBLE_VERSION;
        if flexible {
            write_compact_array_with(buf, self.api_keys.as_deref(), |key, buf| {
                write_key(key, buf);
                buf.write(&TaggedFields::default())
            })?;
        } else {
            write_array_with(buf, self.api_keys.as_deref(), |key, buf| {
                write_key(key, buf);
                Ok(())
            })?;
        }
        if version >= 1 {
            buf.put_i32(self.throttle_time_ms);
        }
        if flexible {
            buf.write(&self.tagged_fields)?;
        }
        Ok(())
    }

    /// Range table keyed by api key. Later duplicates win.
    pub fn supported_versions(&self) -> SupportedApiVersions {
        self.api_keys
            .iter()
            .flatten()
            .map(|key| (key.api_key, VersionRange::new(key.min_version, key.max_version)))
            .collect()
    }
}

fn read_key(buf: &mut ReadBuffer) -> Result<ApiVersionKey> {
    Ok(ApiVersionKey {
        api_key: buf.read_i16()?,
        min_version: buf.read_i16()?,
        max_version: buf.read_i16()?,
    })
}

fn write_key(key: &ApiVersionKey, buf: &mut WriteBuffer) {
    buf.put_i16(key.api_key);
    buf.put_i16(key.min_version);
    buf.put_i16(key.max_version);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> ApiVersionsRequestBuilder {
        ApiVersionsRequestBuilder::new(Some("cli".into()), "thorwire", "0.1.0")
    }

    #[test]
    fn v3_request_body_carries_software_identity() {
        let request = builder().build(0, 0, 3).unwrap();
        assert_eq!(request.version, 3);
        let mut buf = WriteBuffer::new();
        request.encode_body(&mut buf).unwrap();
        let mut expected = vec![9u8];
        expected.extend_from_slice(b"thorwire");
        expected.push(6);
        expected.extend_from_slice(b"0.1.0");
        expected.push(0);
        assert_eq!(buf.as_slice(), &expected[..]);
        assert!(request.header(1).tagged_fields.is_some());
    }

    #[test]
    fn v0_request_has_empty_body_and_header_v1() {
        let request = builder().build(0, 0, 0).unwrap();
        let mut buf = WriteBuffer::new();
        request.encode_body(&mut buf).unwrap();
        assert!(buf.is_empty());
        assert!(request.header(1).tagged_fields.is_none());
    }

    #[test]
    fn build_outside_supported_range_fails() {
        assert!(builder().build(0, 4, 9).is_err());
        assert_eq!(builder().build(0, 1, 9).unwrap().version, 3);
    }

    #[test]
    fn response_layouts_decode_per_version() {
        let response = ApiVersionsResponse {
            error_code: 0,
            api_keys: Some(vec![ApiVersionKey::new(0, 3, 9), ApiVersionKey::new(18, 0, 3)]),
            throttle_time_ms: 12,
            tagged_fields: TaggedFields::default(),
        };
        for version in 0..=3 {
            let mut buf = WriteBuffer::new();
            response.encode(&mut buf, version).unwrap();
            let mut read = ReadBuffer::new(buf.freeze());
            let decoded = ApiVersionsResponse::decode(&mut read, version).unwrap();
            assert!(read.is_empty(), "v{} left bytes", version);
            assert_eq!(decoded.api_keys, response.api_keys);
            let expected_throttle = if version >= 1 { 12 } else { 0 };
            assert_eq!(decoded.throttle_time_ms, expected_throttle);
        }
    }

    #[test]
    fn unsupported_version_error_uses_v0_layout() {
        let response = ApiVersionsResponse {
            error_code: error_code::UNSUPPORTED_VERSION,
            api_keys: Some(vec![ApiVersionKey::new(18, 0, 2)]),
            ..Default::default()
        };
        let mut buf = WriteBuffer::new();
        response.encode(&mut buf, 0).unwrap();
        let mut read = ReadBuffer::new(buf.freeze());
        let decoded = ApiVersionsResponse::decode(&mut read, 3).unwrap();
        assert_eq!(decoded.error_code, 35);
        assert_eq!(
            decoded.supported_versions().get(&18),
            Some(&VersionRange::new(0, 2))
        );
    }
}

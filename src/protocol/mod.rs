//! Kafka binary wire protocol: buffers, primitive codecs, headers and the
//! ApiVersions messages used for version negotiation.
//!
//! Frame: int32 (BE) length + header + body.

pub mod api_versions;
pub mod buffer;
pub mod codec;
pub mod header;

pub use api_versions::{
    ApiVersionKey, ApiVersionsRequest, ApiVersionsRequestBuilder, ApiVersionsResponse,
    API_VERSIONS_RANGE,
};
pub use buffer::{ReadBuffer, WriteBuffer};
pub use codec::{
    Array, CompactArray, CompactBytes, CompactNullableBytes, CompactNullableString,
    CompactString, Decode, Encode, KafkaBytes, KafkaString, NullableBytes, NullableString,
    TaggedFields, UnsignedVarInt, VarInt, VarIntBytes, VarLong,
};
pub use header::{
    Request, RequestBuilder, RequestHeader, ResponseHeader, ResponseHeaderV0, ResponseHeaderV1,
};

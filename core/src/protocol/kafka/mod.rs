//! The slice of the Kafka wire protocol kestrel speaks: version discovery,
//! topic description and record fetch.
//!
//! Every message is an int32 size followed by a header and a body:
//! ```text
//! RequestMessage => MessageSize RequestHeader RequestBody
//! MessageSize => int32
//! RequestHeader => api_key api_version correlation_id client_id TAG_BUFFER
//! api_key => int16
//! api_version => int16
//! correlation_id => int32
//! client_id => nullable_string
//! ```
//!
//! Responses echo the correlation id:
//! ```text
//! ResponseMessage => MessageSize correlation_id [TAG_BUFFER] ResponseBody
//! ```
//!
//! ## Served keys
//!
//! - **ApiKey 1**: Fetch - raw partition log contents, v0-v16
//! - **ApiKey 18**: ApiVersions - capability discovery, v0-v4
//! - **ApiKey 75**: DescribeTopicPartitions - topic and partition metadata, v0

pub mod api_versions;
pub mod codec;
pub mod decoder;
pub mod describe_topic_partitions;
pub mod encoder;
pub mod errors;
pub mod fetch;
pub mod messages;

pub use api_versions::*;
pub use codec::{KafkaCodec, KafkaCodecError, KafkaFrameCodec};
pub use decoder::ByteCursor;
pub use encoder::KafkaBufMutExt;
pub use errors::*;
pub use messages::*;

/// Kafka API Keys
pub const API_KEY_FETCH: i16 = 1;
pub const API_KEY_API_VERSIONS: i16 = 18;
pub const API_KEY_DESCRIBE_TOPIC_PARTITIONS: i16 = 75;

/// Whether the request header carries a tagged-field section (header v2).
///
/// ApiVersions and API keys the broker does not know are always flexible.
pub fn is_flexible_request_header(api_key: i16, api_version: i16) -> bool {
    match api_key {
        API_KEY_FETCH => api_version >= 12,
        _ => true,
    }
}

/// Whether a missing or malformed header tag buffer is tolerated.
///
/// Nothing is read after the header of an unknown API or of an ApiVersions
/// request below v3, so older clients that omit the tag buffer still get an
/// answer.
pub fn is_optional_header_tag_buffer(api_key: i16, api_version: i16) -> bool {
    match api_key {
        API_KEY_API_VERSIONS => api_version < 3,
        API_KEY_FETCH | API_KEY_DESCRIBE_TOPIC_PARTITIONS => false,
        _ => true,
    }
}

/// Whether the response header carries a tagged-field section (header v1).
///
/// ApiVersions responses always use header v0 so that clients can parse them
/// before version negotiation completes.
pub fn is_flexible_response_header(api_key: i16, api_version: i16) -> bool {
    match api_key {
        API_KEY_API_VERSIONS => false,
        API_KEY_FETCH => api_version >= 12,
        API_KEY_DESCRIBE_TOPIC_PARTITIONS => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_header_flexibility() {
        assert!(is_flexible_request_header(API_KEY_API_VERSIONS, 0));
        assert!(is_flexible_request_header(API_KEY_API_VERSIONS, 2));
        assert!(is_flexible_request_header(API_KEY_API_VERSIONS, 3));
        assert!(is_flexible_request_header(API_KEY_API_VERSIONS, 4));
        assert!(!is_flexible_request_header(API_KEY_FETCH, 11));
        assert!(is_flexible_request_header(API_KEY_FETCH, 16));
        assert!(is_flexible_request_header(API_KEY_DESCRIBE_TOPIC_PARTITIONS, 0));
        assert!(is_flexible_request_header(42, 0));
    }

    #[test]
    fn test_optional_header_tag_buffer() {
        assert!(is_optional_header_tag_buffer(API_KEY_API_VERSIONS, 0));
        assert!(is_optional_header_tag_buffer(API_KEY_API_VERSIONS, 2));
        assert!(!is_optional_header_tag_buffer(API_KEY_API_VERSIONS, 3));
        assert!(!is_optional_header_tag_buffer(API_KEY_FETCH, 16));
        assert!(!is_optional_header_tag_buffer(API_KEY_DESCRIBE_TOPIC_PARTITIONS, 0));
        assert!(is_optional_header_tag_buffer(42, 0));
    }

    #[test]
    fn test_response_header_flexibility() {
        assert!(!is_flexible_response_header(API_KEY_API_VERSIONS, 4));
        assert!(is_flexible_response_header(API_KEY_FETCH, 16));
        assert!(!is_flexible_response_header(API_KEY_FETCH, 4));
        assert!(is_flexible_response_header(API_KEY_DESCRIBE_TOPIC_PARTITIONS, 0));
    }
}

//! Kafka API Version Support
//!
//! This module handles API version negotiation: the table of APIs and version
//! ranges the broker serves, and the ApiVersions (key 18) body codec.
//!
//! ```text
//! ApiVersions Request (Version: 3+) => client_software_name client_software_version TAG_BUFFER
//! ApiVersions Response (all versions) => error_code [api_keys] throttle_time_ms TAG_BUFFER
//!   api_keys => api_key min_version max_version TAG_BUFFER
//! ```

use bytes::{BufMut, BytesMut};

use super::codec::{KafkaCodec, Result};
use super::decoder::ByteCursor;
use super::encoder::KafkaBufMutExt;
use super::messages::*;
use super::{API_KEY_API_VERSIONS, API_KEY_DESCRIBE_TOPIC_PARTITIONS, API_KEY_FETCH};

/// Supported version range of one Kafka API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiVersionInfo {
    pub api_key: i16,
    pub min_version: i16,
    pub max_version: i16,
}

impl ApiVersionInfo {
    pub const fn new(api_key: i16, min_version: i16, max_version: i16) -> Self {
        Self {
            api_key,
            min_version,
            max_version,
        }
    }

    /// Check if a version is supported for this API
    pub fn supports_version(&self, version: i16) -> bool {
        version >= self.min_version && version <= self.max_version
    }

    /// Nearest supported version, used to pick a response layout for
    /// out-of-range requests.
    pub fn clamp_version(&self, version: i16) -> i16 {
        version.clamp(self.min_version, self.max_version)
    }
}

impl From<ApiVersionInfo> for KafkaApiVersion {
    fn from(info: ApiVersionInfo) -> Self {
        Self {
            api_key: info.api_key,
            min_version: info.min_version,
            max_version: info.max_version,
        }
    }
}

/// Every API the broker serves, in advertisement order.
pub const SUPPORTED_APIS: [ApiVersionInfo; 3] = [
    ApiVersionInfo::new(API_KEY_API_VERSIONS, 0, 4),
    ApiVersionInfo::new(API_KEY_DESCRIBE_TOPIC_PARTITIONS, 0, 0),
    ApiVersionInfo::new(API_KEY_FETCH, 0, 16),
];

/// Get version info for an API key
pub fn get_version_info(api_key: i16) -> Option<&'static ApiVersionInfo> {
    SUPPORTED_APIS.iter().find(|info| info.api_key == api_key)
}

/// Check if an API key and version combination is supported
pub fn is_supported(api_key: i16, version: i16) -> bool {
    get_version_info(api_key).map_or(false, |info| info.supports_version(version))
}

// ============================================================================
// API VERSIONS REQUEST/RESPONSE
// ============================================================================

impl KafkaCodec {
    pub(crate) fn decode_api_versions_request(
        header: KafkaRequestHeader,
        cursor: &mut ByteCursor<'_>,
    ) -> Result<KafkaApiVersionsRequest> {
        // v0-2 have an empty body; unsupported versions have an unknown layout.
        if header.api_version < 3 || !is_supported(API_KEY_API_VERSIONS, header.api_version) {
            return Ok(KafkaApiVersionsRequest {
                header,
                client_software_name: String::new(),
                client_software_version: String::new(),
            });
        }

        let client_software_name = cursor.read_compact_string()?;
        let client_software_version = cursor.read_compact_string()?;
        cursor.read_tagged_fields()?;

        Ok(KafkaApiVersionsRequest {
            header,
            client_software_name,
            client_software_version,
        })
    }

    /// Every version is answered in the compact layout, unsupported ones
    /// included.
    pub(crate) fn encode_api_versions_response(
        response: &KafkaApiVersionsResponse,
        buf: &mut BytesMut,
    ) -> Result<()> {
        buf.put_i16(response.error_code);
        buf.put_compact_array_len(response.api_keys.len());
        for api in &response.api_keys {
            buf.put_i16(api.api_key);
            buf.put_i16(api.min_version);
            buf.put_i16(api.max_version);
            buf.put_empty_tagged_fields();
        }
        buf.put_i32(response.throttle_time_ms);
        buf.put_empty_tagged_fields();
        Ok(())
    }
}

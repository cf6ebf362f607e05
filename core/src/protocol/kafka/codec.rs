//! Kafka Wire Protocol Codec
//!
//! Header and request decoding, response encoding and length-prefixed framing.
//!
//! The Kafka protocol uses a binary format with the following structure:
//! - All integers are encoded in network byte order (big-endian)
//! - Strings are length-prefixed with int16 length, or uvarint length+1 in
//!   flexible versions
//! - Arrays are length-prefixed with int32 length, or uvarint length+1 in
//!   flexible versions
//! - Nullable fields use -1 (or 0 in compact form) to indicate null
//!
//! The per-API body codecs live next to this file and extend [`KafkaCodec`].

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use super::decoder::ByteCursor;
use super::encoder::KafkaBufMutExt;
use super::messages::*;
use super::{
    is_flexible_request_header, is_flexible_response_header, is_optional_header_tag_buffer,
    API_KEY_API_VERSIONS, API_KEY_DESCRIBE_TOPIC_PARTITIONS, API_KEY_FETCH,
};

/// Largest frame accepted unless configured otherwise.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 100_000_000;

#[derive(Debug, Error)]
pub enum KafkaCodecError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid message format: {0}")]
    InvalidFormat(String),
    #[error("Unsupported API version: key={0}, version={1}")]
    UnsupportedVersion(i16, i16),
    #[error("Unsupported API key: {0}")]
    UnsupportedApiKey(i16),
    #[error("Buffer underrun: needed {needed}, available {available}")]
    BufferUnderrun { needed: usize, available: usize },
    #[error("Varint is longer than its maximum encoded size")]
    VarintTooLong,
    #[error("Invalid length prefix: {0}")]
    InvalidLength(i64),
    #[error("String is not valid UTF-8")]
    InvalidUtf8,
    #[error("Frame of {size} bytes exceeds the maximum of {max} bytes")]
    FrameTooLarge { size: usize, max: usize },
}

impl From<bytes::TryGetError> for KafkaCodecError {
    fn from(e: bytes::TryGetError) -> Self {
        KafkaCodecError::BufferUnderrun {
            needed: e.requested,
            available: e.available,
        }
    }
}

pub type Result<T> = std::result::Result<T, KafkaCodecError>;

/// Kafka protocol codec for encoding/decoding messages
pub struct KafkaCodec;

impl KafkaCodec {
    /// Minimum header size: api_key + api_version + correlation_id + client_id length
    const MIN_HEADER_SIZE: usize = 10;

    /// Decode a request header, leaving the cursor at the start of the body.
    pub fn decode_header(cursor: &mut ByteCursor<'_>) -> Result<KafkaRequestHeader> {
        if cursor.remaining() < Self::MIN_HEADER_SIZE {
            return Err(KafkaCodecError::BufferUnderrun {
                needed: Self::MIN_HEADER_SIZE,
                available: cursor.remaining(),
            });
        }

        let api_key = cursor.read_i16()?;
        let api_version = cursor.read_i16()?;
        let correlation_id = cursor.read_i32()?;
        let client_id = cursor.read_nullable_string()?;

        let tagged_fields = if !is_flexible_request_header(api_key, api_version) {
            TaggedFields::default()
        } else if !is_optional_header_tag_buffer(api_key, api_version) {
            cursor.read_tagged_fields()?
        } else {
            cursor.read_tagged_fields().unwrap_or_else(|e| {
                debug!(
                    "Ignoring header tag buffer for api_key={} v{}: {}",
                    api_key, api_version, e
                );
                TaggedFields::default()
            })
        };

        Ok(KafkaRequestHeader {
            api_key,
            api_version,
            correlation_id,
            client_id,
            tagged_fields,
            consumed_bytes: cursor.offset(),
        })
    }

    /// Decode a Kafka request from a frame with its length prefix removed
    pub fn decode_request(data: &Bytes) -> Result<KafkaRequest> {
        let mut cursor = ByteCursor::new(data.as_ref());
        let header = Self::decode_header(&mut cursor)?;

        debug!(
            "Decoding request api_key={} api_version={} correlation_id={} client_id={:?}",
            header.api_key, header.api_version, header.correlation_id, header.client_id
        );

        match header.api_key {
            API_KEY_API_VERSIONS => {
                Self::decode_api_versions_request(header, &mut cursor).map(KafkaRequest::ApiVersions)
            }
            API_KEY_DESCRIBE_TOPIC_PARTITIONS => {
                Self::decode_describe_topic_partitions_request(header, &mut cursor)
                    .map(KafkaRequest::DescribeTopicPartitions)
            }
            API_KEY_FETCH => Self::decode_fetch_request(header, &mut cursor).map(KafkaRequest::Fetch),
            _ => Ok(KafkaRequest::Unknown(header)),
        }
    }

    /// Encode a response, header included, without the length prefix
    pub fn encode_response(response: &KafkaResponse) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(256);

        match response {
            KafkaResponse::ApiVersions(resp) => {
                Self::encode_response_header(&resp.header, API_KEY_API_VERSIONS, 0, &mut buf);
                Self::encode_api_versions_response(resp, &mut buf)?;
            }
            KafkaResponse::DescribeTopicPartitions(resp) => {
                Self::encode_response_header(&resp.header, API_KEY_DESCRIBE_TOPIC_PARTITIONS, 0, &mut buf);
                Self::encode_describe_topic_partitions_response(resp, &mut buf)?;
            }
            KafkaResponse::Fetch(resp) => {
                Self::encode_response_header(&resp.header, API_KEY_FETCH, resp.api_version, &mut buf);
                Self::encode_fetch_response(resp, &mut buf)?;
            }
            KafkaResponse::Error(resp) => {
                buf.put_i32(resp.header.correlation_id);
                buf.put_i16(resp.error_code);
            }
        }

        Ok(buf.freeze())
    }

    fn encode_response_header(
        header: &KafkaResponseHeader,
        api_key: i16,
        api_version: i16,
        buf: &mut BytesMut,
    ) {
        buf.put_i32(header.correlation_id);
        if is_flexible_response_header(api_key, api_version) {
            buf.put_empty_tagged_fields();
        }
    }
}

/// Length-prefixed framing for Kafka connections.
///
/// Decoding yields the frame payload without its 4-byte prefix; encoding
/// prepends the prefix.
#[derive(Debug, Clone, Copy)]
pub struct KafkaFrameCodec {
    max_frame_size: usize,
}

impl KafkaFrameCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

impl Default for KafkaFrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for KafkaFrameCodec {
    type Item = Bytes;
    type Error = KafkaCodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < 4 {
            // Need at least 4 bytes for message length
            return Ok(None);
        }

        let message_length = i32::from_be_bytes([src[0], src[1], src[2], src[3]]);
        if message_length < 0 {
            return Err(KafkaCodecError::InvalidLength(message_length as i64));
        }
        let message_length = message_length as usize;
        if message_length > self.max_frame_size {
            return Err(KafkaCodecError::FrameTooLarge {
                size: message_length,
                max: self.max_frame_size,
            });
        }

        let total_length = 4 + message_length;
        if src.len() < total_length {
            src.reserve(total_length - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(total_length);
        frame.advance(4);
        Ok(Some(frame.freeze()))
    }
}

impl Encoder<Bytes> for KafkaFrameCodec {
    type Error = KafkaCodecError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(4 + item.len());
        dst.put_u32(item.len() as u32);
        dst.extend_from_slice(&item);
        Ok(())
    }
}

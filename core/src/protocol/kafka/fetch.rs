//! Fetch (key 1) body codec, versions 0 through 16.
//!
//! ```text
//! Fetch Request => [replica_id] max_wait_ms min_bytes [max_bytes] [isolation_level]
//!                  [session_id session_epoch] [topics] [forgotten_topics_data] [rack_id]
//!   topics => topic | topic_id [partitions]
//!     partitions => partition [current_leader_epoch] fetch_offset [last_fetched_epoch]
//!                   [log_start_offset] partition_max_bytes
//!
//! Fetch Response => [throttle_time_ms] [error_code session_id] [responses]
//!   responses => topic | topic_id [partitions]
//!     partitions => partition_index error_code high_watermark [last_stable_offset]
//!                   [log_start_offset] [aborted_transactions] [preferred_read_replica] records
//! ```
//!
//! Topics are named up to v12 and referenced by topic id from v13. Versions
//! 12 and above are flexible.

use bytes::{BufMut, BytesMut};
use tracing::debug;

use super::codec::{KafkaCodec, KafkaCodecError, Result};
use super::decoder::ByteCursor;
use super::encoder::KafkaBufMutExt;
use super::messages::*;
use super::{is_supported, API_KEY_FETCH};

/// First flexible Fetch version.
pub const FETCH_FLEXIBLE_VERSION: i16 = 12;
/// First Fetch version that references topics by id.
pub const FETCH_TOPIC_ID_VERSION: i16 = 13;

/// Whether a Fetch version references topics by id rather than by name.
pub fn uses_topic_ids(api_version: i16) -> bool {
    api_version >= FETCH_TOPIC_ID_VERSION
}

// ============================================================================
// FETCH REQUEST/RESPONSE
// ============================================================================

impl KafkaCodec {
    pub(crate) fn decode_fetch_request(
        header: KafkaRequestHeader,
        cursor: &mut ByteCursor<'_>,
    ) -> Result<KafkaFetchRequest> {
        let version = header.api_version;
        if !is_supported(API_KEY_FETCH, version) {
            debug!("Skipping body of unsupported Fetch v{}", version);
            return Ok(KafkaFetchRequest {
                header,
                ..Default::default()
            });
        }

        let flexible = version >= FETCH_FLEXIBLE_VERSION;
        let topic_ids = uses_topic_ids(version);

        let replica_id = if version <= 14 { cursor.read_i32()? } else { -1 };
        let max_wait_ms = cursor.read_i32()?;
        let min_bytes = cursor.read_i32()?;
        let max_bytes = if version >= 3 { cursor.read_i32()? } else { i32::MAX };
        let isolation_level = if version >= 4 { cursor.read_i8()? } else { 0 };
        let (session_id, session_epoch) = if version >= 7 {
            (cursor.read_i32()?, cursor.read_i32()?)
        } else {
            (0, -1)
        };

        let topic_count = cursor.read_array_len_versioned(flexible)?;
        let mut topics = Vec::with_capacity(topic_count.min(1024));
        for _ in 0..topic_count {
            let mut topic = KafkaTopicFetchData::default();
            if topic_ids {
                topic.topic_id = cursor.read_uuid()?;
            } else {
                topic.topic = cursor.read_string_versioned(flexible)?;
            }

            let partition_count = cursor.read_array_len_versioned(flexible)?;
            topic.partitions.reserve(partition_count.min(1024));
            for _ in 0..partition_count {
                let partition = cursor.read_i32()?;
                let current_leader_epoch = if version >= 9 { cursor.read_i32()? } else { -1 };
                let fetch_offset = cursor.read_i64()?;
                let last_fetched_epoch = if version >= 12 { cursor.read_i32()? } else { -1 };
                let log_start_offset = if version >= 5 { cursor.read_i64()? } else { -1 };
                let partition_max_bytes = cursor.read_i32()?;
                if flexible {
                    cursor.read_tagged_fields()?;
                }
                topic.partitions.push(KafkaPartitionFetchData {
                    partition,
                    current_leader_epoch,
                    fetch_offset,
                    last_fetched_epoch,
                    log_start_offset,
                    partition_max_bytes,
                });
            }
            if flexible {
                cursor.read_tagged_fields()?;
            }
            topics.push(topic);
        }

        let mut forgotten_topics_data = Vec::new();
        if version >= 7 {
            let forgotten_count = cursor.read_array_len_versioned(flexible)?;
            forgotten_topics_data.reserve(forgotten_count.min(1024));
            for _ in 0..forgotten_count {
                let mut forgotten = KafkaForgottenTopic::default();
                if topic_ids {
                    forgotten.topic_id = cursor.read_uuid()?;
                } else {
                    forgotten.topic = cursor.read_string_versioned(flexible)?;
                }
                let partition_count = cursor.read_array_len_versioned(flexible)?;
                for _ in 0..partition_count {
                    forgotten.partitions.push(cursor.read_i32()?);
                }
                if flexible {
                    cursor.read_tagged_fields()?;
                }
                forgotten_topics_data.push(forgotten);
            }
        }

        let rack_id = if version >= 11 {
            cursor.read_string_versioned(flexible)?
        } else {
            String::new()
        };

        if flexible {
            cursor.read_tagged_fields()?;
        }

        Ok(KafkaFetchRequest {
            header,
            replica_id,
            max_wait_ms,
            min_bytes,
            max_bytes,
            isolation_level,
            session_id,
            session_epoch,
            topics,
            forgotten_topics_data,
            rack_id,
        })
    }

    pub(crate) fn encode_fetch_response(
        response: &KafkaFetchResponse,
        buf: &mut BytesMut,
    ) -> Result<()> {
        let version = response.api_version;
        let flexible = version >= FETCH_FLEXIBLE_VERSION;
        let topic_ids = uses_topic_ids(version);

        if version >= 1 {
            buf.put_i32(response.throttle_time_ms);
        }
        if version >= 7 {
            buf.put_i16(response.error_code);
            buf.put_i32(response.session_id);
        }

        buf.put_array_len_versioned(response.responses.len(), flexible);
        for topic in &response.responses {
            if topic_ids {
                buf.put_uuid(&topic.topic_id);
            } else {
                if !flexible && topic.topic.len() > i16::MAX as usize {
                    return Err(KafkaCodecError::InvalidFormat(format!(
                        "topic name of {} bytes does not fit a STRING",
                        topic.topic.len()
                    )));
                }
                buf.put_string_versioned(&topic.topic, flexible);
            }

            buf.put_array_len_versioned(topic.partitions.len(), flexible);
            for partition in &topic.partitions {
                buf.put_i32(partition.partition_index);
                buf.put_i16(partition.error_code);
                buf.put_i64(partition.high_watermark);
                if version >= 4 {
                    buf.put_i64(partition.last_stable_offset);
                }
                if version >= 5 {
                    buf.put_i64(partition.log_start_offset);
                }
                if version >= 4 {
                    buf.put_array_len_versioned(partition.aborted_transactions.len(), flexible);
                    for aborted in &partition.aborted_transactions {
                        buf.put_i64(aborted.producer_id);
                        buf.put_i64(aborted.first_offset);
                        if flexible {
                            buf.put_empty_tagged_fields();
                        }
                    }
                }
                if version >= 11 {
                    buf.put_i32(partition.preferred_read_replica);
                }
                buf.put_nullable_bytes_versioned(partition.records.as_deref(), flexible);
                if flexible {
                    buf.put_empty_tagged_fields();
                }
            }
            if flexible {
                buf.put_empty_tagged_fields();
            }
        }

        if flexible {
            buf.put_empty_tagged_fields();
        }
        Ok(())
    }
}

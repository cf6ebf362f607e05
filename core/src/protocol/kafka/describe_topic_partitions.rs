//! DescribeTopicPartitions (key 75) body codec.
//!
//! ```text
//! DescribeTopicPartitions Request (Version: 0) => [topics] response_partition_limit cursor TAG_BUFFER
//!   topics => name TAG_BUFFER
//!   cursor => topic_name partition_index TAG_BUFFER     (nullable: int8 -1 = null)
//!
//! DescribeTopicPartitions Response (Version: 0) => throttle_time_ms [topics] next_cursor TAG_BUFFER
//!   topics => error_code name topic_id is_internal [partitions] topic_authorized_operations TAG_BUFFER
//!     partitions => error_code partition_index leader_id leader_epoch [replica_nodes] [isr_nodes]
//!                   [eligible_leader_replicas] [last_known_elr] [offline_replicas] TAG_BUFFER
//! ```

use bytes::{BufMut, BytesMut};

use super::codec::{KafkaCodec, KafkaCodecError, Result};
use super::decoder::ByteCursor;
use super::encoder::KafkaBufMutExt;
use super::messages::*;

/// READ, WRITE, CREATE, DELETE, ALTER, DESCRIBE, DESCRIBE_CONFIGS and
/// ALTER_CONFIGS, as ACL operation bits.
pub const DEFAULT_TOPIC_AUTHORIZED_OPERATIONS: i32 =
    (1 << 3) | (1 << 4) | (1 << 5) | (1 << 6) | (1 << 7) | (1 << 8) | (1 << 10) | (1 << 11);

/// Marker byte of a null nullable struct.
const NULL_STRUCT: i8 = -1;
const PRESENT_STRUCT: i8 = 1;

impl KafkaCodec {
    /// Only the v0 layout exists, so it is used for every requested version.
    pub(crate) fn decode_describe_topic_partitions_request(
        header: KafkaRequestHeader,
        cursor: &mut ByteCursor<'_>,
    ) -> Result<KafkaDescribeTopicPartitionsRequest> {
        let topic_count = cursor.read_compact_array_len()?.unwrap_or(0);
        let mut topics = Vec::with_capacity(topic_count.min(1024));
        for _ in 0..topic_count {
            topics.push(cursor.read_compact_string()?);
            cursor.read_tagged_fields()?;
        }

        let response_partition_limit = cursor.read_i32()?;

        let cursor_token = match cursor.read_i8()? {
            NULL_STRUCT => None,
            PRESENT_STRUCT => {
                let topic_name = cursor.read_compact_string()?;
                let partition_index = cursor.read_i32()?;
                cursor.read_tagged_fields()?;
                Some(KafkaDescribeTopicPartitionsCursor {
                    topic_name,
                    partition_index,
                })
            }
            other => {
                return Err(KafkaCodecError::InvalidFormat(format!(
                    "invalid cursor marker: {}",
                    other
                )))
            }
        };

        cursor.read_tagged_fields()?;

        Ok(KafkaDescribeTopicPartitionsRequest {
            header,
            topics,
            response_partition_limit,
            cursor: cursor_token,
        })
    }

    pub(crate) fn encode_describe_topic_partitions_response(
        response: &KafkaDescribeTopicPartitionsResponse,
        buf: &mut BytesMut,
    ) -> Result<()> {
        buf.put_i32(response.throttle_time_ms);

        buf.put_compact_array_len(response.topics.len());
        for topic in &response.topics {
            buf.put_i16(topic.error_code);
            buf.put_compact_nullable_string(topic.name.as_deref());
            buf.put_uuid(&topic.topic_id);
            buf.put_bool(topic.is_internal);

            buf.put_compact_array_len(topic.partitions.len());
            for partition in &topic.partitions {
                buf.put_i16(partition.error_code);
                buf.put_i32(partition.partition_index);
                buf.put_i32(partition.leader_id);
                buf.put_i32(partition.leader_epoch);
                buf.put_compact_i32_array(&partition.replica_nodes);
                buf.put_compact_i32_array(&partition.isr_nodes);
                buf.put_compact_i32_array(&partition.eligible_leader_replicas);
                buf.put_compact_i32_array(&partition.last_known_elr);
                buf.put_compact_i32_array(&partition.offline_replicas);
                buf.put_empty_tagged_fields();
            }

            buf.put_i32(topic.topic_authorized_operations);
            buf.put_empty_tagged_fields();
        }

        match &response.next_cursor {
            None => buf.put_i8(NULL_STRUCT),
            Some(next) => {
                buf.put_i8(PRESENT_STRUCT);
                buf.put_compact_string(&next.topic_name);
                buf.put_i32(next.partition_index);
                buf.put_empty_tagged_fields();
            }
        }

        buf.put_empty_tagged_fields();
        Ok(())
    }
}

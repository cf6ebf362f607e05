//! Typed requests and responses for the three APIs kestrel serves.
//!
//! Field names mirror the upstream JSON message schemas so the codecs read
//! like the wire layout.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{API_KEY_API_VERSIONS, API_KEY_DESCRIBE_TOPIC_PARTITIONS, API_KEY_FETCH};

/// A single entry of a tagged-field section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedField {
    pub tag: u32,
    pub data: Bytes,
}

/// Tagged-field section of a flexible message. Usually empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedFields(pub Vec<TaggedField>);

impl TaggedFields {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TaggedField> {
        self.0.iter()
    }
}

/// Request header, v1 or v2 depending on the API and version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KafkaRequestHeader {
    pub api_key: i16,
    pub api_version: i16,
    pub correlation_id: i32,
    pub client_id: Option<String>,
    pub tagged_fields: TaggedFields,
    /// Offset of the request body within the frame.
    pub consumed_bytes: usize,
}

/// Correlation id echoed back; flexible responses add a tag section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KafkaResponseHeader {
    pub correlation_id: i32,
}

impl From<&KafkaRequestHeader> for KafkaResponseHeader {
    fn from(header: &KafkaRequestHeader) -> Self {
        Self {
            correlation_id: header.correlation_id,
        }
    }
}

// --- ApiVersions (18) ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaApiVersionsRequest {
    pub header: KafkaRequestHeader,
    pub client_software_name: String,
    pub client_software_version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KafkaApiVersion {
    pub api_key: i16,
    pub min_version: i16,
    pub max_version: i16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaApiVersionsResponse {
    pub header: KafkaResponseHeader,
    pub error_code: i16,
    pub api_keys: Vec<KafkaApiVersion>,
    pub throttle_time_ms: i32,
}

// --- DescribeTopicPartitions (75) ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KafkaDescribeTopicPartitionsCursor {
    pub topic_name: String,
    pub partition_index: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaDescribeTopicPartitionsRequest {
    pub header: KafkaRequestHeader,
    pub topics: Vec<String>,
    pub response_partition_limit: i32,
    pub cursor: Option<KafkaDescribeTopicPartitionsCursor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaDescribeTopicPartitionsResponse {
    pub header: KafkaResponseHeader,
    pub throttle_time_ms: i32,
    pub topics: Vec<KafkaDescribeTopicPartitionsTopic>,
    pub next_cursor: Option<KafkaDescribeTopicPartitionsCursor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KafkaDescribeTopicPartitionsTopic {
    pub error_code: i16,
    pub name: Option<String>,
    pub topic_id: Uuid,
    pub is_internal: bool,
    pub partitions: Vec<KafkaDescribeTopicPartitionsPartition>,
    pub topic_authorized_operations: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KafkaDescribeTopicPartitionsPartition {
    pub error_code: i16,
    pub partition_index: i32,
    pub leader_id: i32,
    pub leader_epoch: i32,
    pub replica_nodes: Vec<i32>,
    pub isr_nodes: Vec<i32>,
    pub eligible_leader_replicas: Vec<i32>,
    pub last_known_elr: Vec<i32>,
    pub offline_replicas: Vec<i32>,
}

// --- Fetch (1) ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KafkaFetchRequest {
    pub header: KafkaRequestHeader,
    pub replica_id: i32,
    pub max_wait_ms: i32,
    pub min_bytes: i32,
    pub max_bytes: i32,
    pub isolation_level: i8,
    pub session_id: i32,
    pub session_epoch: i32,
    pub topics: Vec<KafkaTopicFetchData>,
    pub forgotten_topics_data: Vec<KafkaForgottenTopic>,
    pub rack_id: String,
}

/// Topics are named up to v12 and identified by id from v13.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KafkaTopicFetchData {
    pub topic: String,
    pub topic_id: Uuid,
    pub partitions: Vec<KafkaPartitionFetchData>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KafkaPartitionFetchData {
    pub partition: i32,
    pub current_leader_epoch: i32,
    pub fetch_offset: i64,
    pub last_fetched_epoch: i32,
    pub log_start_offset: i64,
    pub partition_max_bytes: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KafkaForgottenTopic {
    pub topic: String,
    pub topic_id: Uuid,
    pub partitions: Vec<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaFetchResponse {
    pub header: KafkaResponseHeader,
    pub api_version: i16,
    pub throttle_time_ms: i32,
    pub error_code: i16,
    pub session_id: i32,
    pub responses: Vec<KafkaTopicFetchResponse>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KafkaTopicFetchResponse {
    pub topic: String,
    pub topic_id: Uuid,
    pub partitions: Vec<KafkaPartitionFetchResponse>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KafkaPartitionFetchResponse {
    pub partition_index: i32,
    pub error_code: i16,
    pub high_watermark: i64,
    pub last_stable_offset: i64,
    pub log_start_offset: i64,
    pub aborted_transactions: Vec<KafkaAbortedTransaction>,
    pub preferred_read_replica: i32,
    /// Raw record batches, passed through uninterpreted.
    pub records: Option<Bytes>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KafkaAbortedTransaction {
    pub producer_id: i64,
    pub first_offset: i64,
}

// --- Dispatch enums ---

/// Minimal response for API keys the broker does not serve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaErrorResponse {
    pub header: KafkaResponseHeader,
    pub error_code: i16,
}

/// A decoded request, one variant per served API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum KafkaRequest {
    ApiVersions(KafkaApiVersionsRequest),
    DescribeTopicPartitions(KafkaDescribeTopicPartitionsRequest),
    Fetch(KafkaFetchRequest),
    /// Any API key without a codec; only the header is decoded.
    Unknown(KafkaRequestHeader),
}

/// A response ready for encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum KafkaResponse {
    ApiVersions(KafkaApiVersionsResponse),
    DescribeTopicPartitions(KafkaDescribeTopicPartitionsResponse),
    Fetch(KafkaFetchResponse),
    Error(KafkaErrorResponse),
}

impl KafkaRequest {
    pub fn header(&self) -> &KafkaRequestHeader {
        match self {
            KafkaRequest::ApiVersions(req) => &req.header,
            KafkaRequest::DescribeTopicPartitions(req) => &req.header,
            KafkaRequest::Fetch(req) => &req.header,
            KafkaRequest::Unknown(header) => header,
        }
    }

    pub fn api_key(&self) -> i16 {
        match self {
            KafkaRequest::ApiVersions(_) => API_KEY_API_VERSIONS,
            KafkaRequest::DescribeTopicPartitions(_) => API_KEY_DESCRIBE_TOPIC_PARTITIONS,
            KafkaRequest::Fetch(_) => API_KEY_FETCH,
            KafkaRequest::Unknown(header) => header.api_key,
        }
    }

    pub fn api_version(&self) -> i16 {
        self.header().api_version
    }

    pub fn correlation_id(&self) -> i32 {
        self.header().correlation_id
    }
}

impl KafkaResponse {
    pub fn correlation_id(&self) -> i32 {
        match self {
            KafkaResponse::ApiVersions(resp) => resp.header.correlation_id,
            KafkaResponse::DescribeTopicPartitions(resp) => resp.header.correlation_id,
            KafkaResponse::Fetch(resp) => resp.header.correlation_id,
            KafkaResponse::Error(resp) => resp.header.correlation_id,
        }
    }
}

use crate::{
    config::BrokerConfig,
    metrics::BrokerMetrics,
    protocol::kafka::{
        api_versions::{get_version_info, is_supported, SUPPORTED_APIS},
        describe_topic_partitions::DEFAULT_TOPIC_AUTHORIZED_OPERATIONS,
        fetch::uses_topic_ids,
        KafkaApiVersionsRequest, KafkaApiVersionsResponse, KafkaCodec,
        KafkaDescribeTopicPartitionsPartition, KafkaDescribeTopicPartitionsRequest,
        KafkaDescribeTopicPartitionsResponse, KafkaDescribeTopicPartitionsTopic, KafkaErrorCode,
        KafkaErrorResponse, KafkaFetchRequest, KafkaFetchResponse, KafkaPartitionFetchData,
        KafkaPartitionFetchResponse, KafkaRequest, KafkaResponse,
        KafkaResponseHeader, KafkaTopicFetchData, KafkaTopicFetchResponse, API_KEY_API_VERSIONS,
        API_KEY_DESCRIBE_TOPIC_PARTITIONS, API_KEY_FETCH,
    },
    storage::{read_partition_log, MetadataIndex, Partition, Topic},
    Result,
};
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Routes decoded requests to their API and builds the response.
///
/// Holds no per-connection state, so one handler is shared by every
/// connection task.
pub struct MessageHandler {
    index: Arc<MetadataIndex>,
    log_dir: PathBuf,
    metrics: Arc<BrokerMetrics>,
}

impl MessageHandler {
    pub fn new(index: Arc<MetadataIndex>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            index,
            log_dir: log_dir.into(),
            metrics: Arc::new(BrokerMetrics::new()),
        }
    }

    /// Loads the metadata index named by `config` and serves partition logs
    /// from its log directory.
    pub fn from_config(config: &BrokerConfig) -> Result<Self> {
        let index = MetadataIndex::load(config.metadata_log_path())?;
        info!(
            "Metadata index ready: {} topics, {} partitions",
            index.topic_count(),
            index.partition_count()
        );
        Ok(Self::new(Arc::new(index), &config.log_dir))
    }

    pub fn get_metrics(&self) -> Arc<BrokerMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn index(&self) -> &Arc<MetadataIndex> {
        &self.index
    }

    /// Decodes one frame payload, dispatches it and encodes the response
    /// payload. A decode failure is returned to the caller, which closes the
    /// connection.
    pub async fn handle_frame(&self, frame: Bytes) -> Result<Bytes> {
        let request = match KafkaCodec::decode_request(&frame) {
            Ok(request) => request,
            Err(e) => {
                self.metrics.error_occurred();
                return Err(e.into());
            }
        };

        self.metrics.request_received(request.api_key());
        let response = self.handle_request(request).await;
        Ok(KafkaCodec::encode_response(&response)?)
    }

    pub async fn handle_request(&self, request: KafkaRequest) -> KafkaResponse {
        debug!(
            "Handling api_key={} api_version={} correlation_id={}",
            request.api_key(),
            request.api_version(),
            request.correlation_id()
        );

        match request {
            KafkaRequest::ApiVersions(req) => {
                KafkaResponse::ApiVersions(self.handle_api_versions(&req))
            }
            KafkaRequest::DescribeTopicPartitions(req) => {
                KafkaResponse::DescribeTopicPartitions(self.handle_describe_topic_partitions(&req))
            }
            KafkaRequest::Fetch(req) => KafkaResponse::Fetch(self.handle_fetch(&req).await),
            KafkaRequest::Unknown(header) => {
                warn!(
                    "Unsupported api_key={} (version {}), correlation_id={}",
                    header.api_key, header.api_version, header.correlation_id
                );
                self.metrics.error_occurred();
                KafkaResponse::Error(KafkaErrorResponse {
                    header: KafkaResponseHeader::from(&header),
                    error_code: KafkaErrorCode::UnsupportedVersion.as_i16(),
                })
            }
        }
    }

    fn handle_api_versions(&self, request: &KafkaApiVersionsRequest) -> KafkaApiVersionsResponse {
        let header = KafkaResponseHeader::from(&request.header);
        let version = request.header.api_version;

        if !is_supported(API_KEY_API_VERSIONS, version) {
            debug!("ApiVersions v{} unsupported, answering with an empty list", version);
            return KafkaApiVersionsResponse {
                header,
                error_code: KafkaErrorCode::UnsupportedVersion.as_i16(),
                api_keys: Vec::new(),
                throttle_time_ms: 0,
            };
        }

        KafkaApiVersionsResponse {
            header,
            error_code: KafkaErrorCode::NoError.as_i16(),
            api_keys: SUPPORTED_APIS.iter().map(|&info| info.into()).collect(),
            throttle_time_ms: 0,
        }
    }

    fn handle_describe_topic_partitions(
        &self,
        request: &KafkaDescribeTopicPartitionsRequest,
    ) -> KafkaDescribeTopicPartitionsResponse {
        let supported = is_supported(API_KEY_DESCRIBE_TOPIC_PARTITIONS, request.header.api_version);

        let topics = request
            .topics
            .iter()
            .map(|name| {
                if !supported {
                    return missing_topic(name, KafkaErrorCode::UnsupportedVersion);
                }
                match self.index.topic_by_name(name) {
                    Some(topic) => described_topic(topic),
                    None => missing_topic(name, KafkaErrorCode::UnknownTopicOrPartition),
                }
            })
            .collect();

        KafkaDescribeTopicPartitionsResponse {
            header: KafkaResponseHeader::from(&request.header),
            throttle_time_ms: 0,
            topics,
            next_cursor: None,
        }
    }

    async fn handle_fetch(&self, request: &KafkaFetchRequest) -> KafkaFetchResponse {
        let header = KafkaResponseHeader::from(&request.header);
        let version = request.header.api_version;

        if !is_supported(API_KEY_FETCH, version) {
            let layout = get_version_info(API_KEY_FETCH)
                .map(|info| info.clamp_version(version))
                .unwrap_or(0);
            debug!("Fetch v{} unsupported, answering with v{} layout", version, layout);
            return KafkaFetchResponse {
                header,
                api_version: layout,
                throttle_time_ms: 0,
                error_code: KafkaErrorCode::UnsupportedVersion.as_i16(),
                session_id: 0,
                responses: Vec::new(),
            };
        }

        let mut responses = Vec::with_capacity(request.topics.len());
        for requested in &request.topics {
            responses.push(self.fetch_topic(version, requested).await);
        }

        KafkaFetchResponse {
            header,
            api_version: version,
            throttle_time_ms: 0,
            error_code: KafkaErrorCode::NoError.as_i16(),
            session_id: 0,
            responses,
        }
    }

    async fn fetch_topic(
        &self,
        version: i16,
        requested: &KafkaTopicFetchData,
    ) -> KafkaTopicFetchResponse {
        let (topic, missing_code) = if uses_topic_ids(version) {
            (
                self.index.topic_by_id(&requested.topic_id),
                KafkaErrorCode::UnknownTopicId,
            )
        } else {
            (
                self.index.topic_by_name(&requested.topic),
                KafkaErrorCode::UnknownTopicOrPartition,
            )
        };

        let mut partitions = Vec::with_capacity(requested.partitions.len());
        match topic {
            Some(topic) => {
                for partition in &requested.partitions {
                    partitions.push(self.fetch_partition(topic, partition).await);
                }
            }
            None => {
                debug!(
                    "Fetch for unknown topic name={:?} id={}, answering {}",
                    requested.topic, requested.topic_id, missing_code
                );
                for partition in &requested.partitions {
                    partitions.push(partition_error(partition.partition, missing_code));
                }
            }
        }

        KafkaTopicFetchResponse {
            topic: requested.topic.clone(),
            topic_id: requested.topic_id,
            partitions,
        }
    }

    async fn fetch_partition(
        &self,
        topic: &Topic,
        requested: &KafkaPartitionFetchData,
    ) -> KafkaPartitionFetchResponse {
        if topic.partition(requested.partition).is_none() {
            return partition_error(requested.partition, KafkaErrorCode::UnknownTopicOrPartition);
        }

        match read_partition_log(&self.log_dir, &topic.name, requested.partition).await {
            Ok(records) => {
                debug!(
                    "Fetched {} bytes from {}-{}",
                    records.len(),
                    topic.name,
                    requested.partition
                );
                KafkaPartitionFetchResponse {
                    records: Some(records),
                    ..partition_error(requested.partition, KafkaErrorCode::NoError)
                }
            }
            Err(e) => {
                warn!(
                    "Failed to read log for {}-{}: {}",
                    topic.name, requested.partition, e
                );
                self.metrics.error_occurred();
                partition_error(requested.partition, KafkaErrorCode::KafkaStorageError)
            }
        }
    }
}

fn described_topic(topic: &Topic) -> KafkaDescribeTopicPartitionsTopic {
    KafkaDescribeTopicPartitionsTopic {
        error_code: KafkaErrorCode::NoError.as_i16(),
        name: Some(topic.name.clone()),
        topic_id: topic.id,
        is_internal: false,
        partitions: topic.partitions.iter().map(described_partition).collect(),
        topic_authorized_operations: DEFAULT_TOPIC_AUTHORIZED_OPERATIONS,
    }
}

fn described_partition(partition: &Partition) -> KafkaDescribeTopicPartitionsPartition {
    KafkaDescribeTopicPartitionsPartition {
        error_code: KafkaErrorCode::NoError.as_i16(),
        partition_index: partition.index,
        leader_id: partition.leader_id,
        leader_epoch: partition.leader_epoch,
        replica_nodes: partition.replica_ids.clone(),
        isr_nodes: partition.isr_ids.clone(),
        eligible_leader_replicas: partition.eligible_leader_replica_ids.clone(),
        last_known_elr: partition.last_known_elr_ids.clone(),
        offline_replicas: partition.offline_replica_ids.clone(),
    }
}

fn missing_topic(name: &str, code: KafkaErrorCode) -> KafkaDescribeTopicPartitionsTopic {
    KafkaDescribeTopicPartitionsTopic {
        error_code: code.as_i16(),
        name: Some(name.to_string()),
        topic_id: Uuid::nil(),
        is_internal: false,
        partitions: Vec::new(),
        topic_authorized_operations: DEFAULT_TOPIC_AUTHORIZED_OPERATIONS,
    }
}

/// A partition entry with no records; callers fill `records` on success.
fn partition_error(partition_index: i32, code: KafkaErrorCode) -> KafkaPartitionFetchResponse {
    KafkaPartitionFetchResponse {
        partition_index,
        error_code: code.as_i16(),
        high_watermark: 0,
        last_stable_offset: 0,
        log_start_offset: 0,
        aborted_transactions: Vec::new(),
        preferred_read_replica: -1,
        records: None,
    }
}

impl std::fmt::Debug for MessageHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageHandler")
            .field("topics", &self.index.topic_count())
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::kafka::KafkaRequestHeader;
    use crate::storage::tests::{metadata_log, partition_record_value, topic_record_value};
    use std::path::Path;
    use tempfile::TempDir;

    fn request_header(api_key: i16, api_version: i16, correlation_id: i32) -> KafkaRequestHeader {
        KafkaRequestHeader {
            api_key,
            api_version,
            correlation_id,
            ..Default::default()
        }
    }

    const FOO_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0091);

    fn handler(log_dir: &Path) -> MessageHandler {
        let log = metadata_log(&[vec![
            topic_record_value("foo", FOO_ID),
            partition_record_value(0, FOO_ID, &[1], &[1], 1, 0),
            partition_record_value(1, FOO_ID, &[1, 2], &[2], 2, 4),
        ]]);
        let index = MetadataIndex::parse(&log).unwrap();
        MessageHandler::new(Arc::new(index), log_dir)
    }

    fn fetch_request(version: i16, topic: &str, id: Uuid, partitions: &[i32]) -> KafkaRequest {
        KafkaRequest::Fetch(KafkaFetchRequest {
            header: request_header(API_KEY_FETCH, version, 7),
            topics: vec![KafkaTopicFetchData {
                topic: topic.to_string(),
                topic_id: id,
                partitions: partitions
                    .iter()
                    .map(|&partition| KafkaPartitionFetchData {
                        partition,
                        ..Default::default()
                    })
                    .collect(),
            }],
            ..Default::default()
        })
    }

    fn expect_fetch(response: KafkaResponse) -> KafkaFetchResponse {
        match response {
            KafkaResponse::Fetch(resp) => resp,
            other => panic!("expected fetch response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_api_versions_lists_all_apis() {
        let dir = TempDir::new().unwrap();
        let handler = handler(dir.path());
        let request = KafkaRequest::ApiVersions(KafkaApiVersionsRequest {
            header: request_header(API_KEY_API_VERSIONS, 4, 11),
            client_software_name: String::new(),
            client_software_version: String::new(),
        });

        match handler.handle_request(request).await {
            KafkaResponse::ApiVersions(resp) => {
                assert_eq!(resp.header.correlation_id, 11);
                assert_eq!(resp.error_code, 0);
                let keys: Vec<i16> = resp.api_keys.iter().map(|k| k.api_key).collect();
                assert_eq!(keys, vec![API_KEY_API_VERSIONS, API_KEY_DESCRIBE_TOPIC_PARTITIONS, API_KEY_FETCH]);
            }
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_api_versions_unsupported_version() {
        let dir = TempDir::new().unwrap();
        let handler = handler(dir.path());
        let request = KafkaRequest::ApiVersions(KafkaApiVersionsRequest {
            header: request_header(API_KEY_API_VERSIONS, 5, 12),
            client_software_name: String::new(),
            client_software_version: String::new(),
        });

        let response = handler.handle_request(request).await;
        match &response {
            KafkaResponse::ApiVersions(resp) => {
                assert_eq!(resp.error_code, 35);
                assert!(resp.api_keys.is_empty());
            }
            other => panic!("unexpected response {:?}", other),
        }
        assert_eq!(
            KafkaCodec::encode_response(&response).unwrap().as_ref(),
            &[0, 0, 0, 12, 0x00, 0x23, 0x01, 0, 0, 0, 0, 0x00]
        );
    }

    #[tokio::test]
    async fn test_describe_preserves_request_order() {
        let dir = TempDir::new().unwrap();
        let handler = handler(dir.path());
        let request = KafkaRequest::DescribeTopicPartitions(KafkaDescribeTopicPartitionsRequest {
            header: request_header(API_KEY_DESCRIBE_TOPIC_PARTITIONS, 0, 3),
            topics: vec!["missing".to_string(), "foo".to_string()],
            response_partition_limit: 100,
            cursor: None,
        });

        match handler.handle_request(request).await {
            KafkaResponse::DescribeTopicPartitions(resp) => {
                assert_eq!(resp.topics.len(), 2);
                assert_eq!(resp.topics[0].error_code, 3);
                assert_eq!(resp.topics[0].topic_id, Uuid::nil());
                assert!(resp.topics[0].partitions.is_empty());

                let foo = &resp.topics[1];
                assert_eq!(foo.error_code, 0);
                assert_eq!(foo.topic_id, FOO_ID);
                assert_eq!(foo.topic_authorized_operations, 0x0DF8);
                let indexes: Vec<i32> = foo.partitions.iter().map(|p| p.partition_index).collect();
                assert_eq!(indexes, vec![0, 1]);
                assert_eq!(foo.partitions[1].leader_id, 2);
                assert_eq!(foo.partitions[1].leader_epoch, 4);
                assert_eq!(foo.partitions[1].replica_nodes, vec![1, 2]);
                assert!(resp.next_cursor.is_none());
            }
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_reads_partition_log() {
        let dir = TempDir::new().unwrap();
        let partition_dir = dir.path().join("foo-0");
        std::fs::create_dir_all(&partition_dir).unwrap();
        std::fs::write(partition_dir.join("00000000000000000000.log"), b"batch").unwrap();

        let handler = handler(dir.path());
        let response = expect_fetch(handler.handle_request(fetch_request(16, "", FOO_ID, &[0])).await);

        assert_eq!(response.error_code, 0);
        let partition = &response.responses[0].partitions[0];
        assert_eq!(partition.error_code, 0);
        assert_eq!(partition.records.as_deref(), Some(&b"batch"[..]));
        assert_eq!(partition.preferred_read_replica, -1);
    }

    #[tokio::test]
    async fn test_fetch_error_codes() {
        let dir = TempDir::new().unwrap();
        let handler = handler(dir.path());

        let unknown_id = expect_fetch(
            handler
                .handle_request(fetch_request(16, "", Uuid::from_u128(1), &[0, 1]))
                .await,
        );
        let codes: Vec<i16> = unknown_id.responses[0].partitions.iter().map(|p| p.error_code).collect();
        assert_eq!(codes, vec![100, 100]);

        let unknown_name = expect_fetch(handler.handle_request(fetch_request(11, "bar", Uuid::nil(), &[0])).await);
        assert_eq!(unknown_name.responses[0].partitions[0].error_code, 3);

        let unknown_partition = expect_fetch(handler.handle_request(fetch_request(16, "", FOO_ID, &[9])).await);
        assert_eq!(unknown_partition.responses[0].partitions[0].error_code, 3);

        // Known partition whose log directory does not exist.
        let missing_log = expect_fetch(handler.handle_request(fetch_request(11, "foo", Uuid::nil(), &[1])).await);
        let partition = &missing_log.responses[0].partitions[0];
        assert_eq!(partition.error_code, 56);
        assert!(partition.records.is_none());
    }

    #[tokio::test]
    async fn test_fetch_unsupported_version() {
        let dir = TempDir::new().unwrap();
        let handler = handler(dir.path());
        let response = expect_fetch(handler.handle_request(fetch_request(17, "", FOO_ID, &[0])).await);
        assert_eq!(response.error_code, 35);
        assert_eq!(response.api_version, 16);
        assert!(response.responses.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_api_key() {
        let dir = TempDir::new().unwrap();
        let handler = handler(dir.path());
        let response = handler
            .handle_request(KafkaRequest::Unknown(request_header(3, 12, 99)))
            .await;
        match response {
            KafkaResponse::Error(resp) => {
                assert_eq!(resp.header.correlation_id, 99);
                assert_eq!(resp.error_code, 35);
            }
            other => panic!("unexpected response {:?}", other),
        }
        assert_eq!(handler.get_metrics().error_count(), 1);
    }
}

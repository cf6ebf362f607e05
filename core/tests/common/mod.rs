//! Shared helpers: metadata log builders, a broker on an ephemeral port and
//! raw request builders.

#![allow(dead_code)]

use bytes::{BufMut, Bytes, BytesMut};
use kestrel::protocol::kafka::KafkaBufMutExt;
use kestrel::{BrokerConfig, BrokerServer};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use uuid::Uuid;

pub const FOO_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0011);
pub const BAR_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0022);

#[path = "../../src/storage/fixtures.rs"]
mod fixtures;

pub use fixtures::*;

/// `foo` with partitions 0 and 1, `bar` with partition 0.
pub fn default_metadata_log() -> Bytes {
    metadata_log(&[
        vec![feature_level_record_value("metadata.version", 20)],
        vec![
            topic_record_value("foo", FOO_ID),
            partition_record_value(0, FOO_ID, &[1], &[1], 1, 0),
            partition_record_value(1, FOO_ID, &[1], &[1], 1, 0),
        ],
        vec![
            topic_record_value("bar", BAR_ID),
            partition_record_value(0, BAR_ID, &[1], &[1], 1, 0),
        ],
    ])
}

pub fn write_metadata_log(log_dir: &Path, contents: &[u8]) {
    let dir = log_dir.join("__cluster_metadata-0");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("00000000000000000000.log"), contents).unwrap();
}

pub fn write_partition_log(log_dir: &Path, topic: &str, partition: i32, contents: &[u8]) {
    let dir = log_dir.join(format!("{}-{}", topic, partition));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("00000000000000000000.log"), contents).unwrap();
}

pub struct TestBroker {
    pub server: Arc<BrokerServer>,
    pub addr: SocketAddr,
    pub log_dir: TempDir,
}

impl TestBroker {
    pub async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr).await.unwrap()
    }
}

impl Drop for TestBroker {
    fn drop(&mut self) {
        self.server.shutdown();
    }
}

/// Starts a broker over a fresh log directory seeded with
/// [`default_metadata_log`].
pub async fn start_broker() -> TestBroker {
    let log_dir = TempDir::new().unwrap();
    write_metadata_log(log_dir.path(), &default_metadata_log());
    start_broker_in(log_dir, |config| config).await
}

pub async fn start_broker_in(
    log_dir: TempDir,
    configure: impl FnOnce(BrokerConfig) -> BrokerConfig,
) -> TestBroker {
    let config = configure(
        BrokerConfig::default()
            .with_log_dir(log_dir.path().to_string_lossy())
            .with_address("127.0.0.1", 0),
    );
    let server = Arc::new(BrokerServer::new(config).unwrap());
    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();

    let task_server = Arc::clone(&server);
    tokio::spawn(async move { task_server.serve(listener).await });

    TestBroker {
        server,
        addr,
        log_dir,
    }
}

pub async fn send_frame(stream: &mut TcpStream, payload: &[u8]) {
    stream.write_all(&(payload.len() as u32).to_be_bytes()).await.unwrap();
    stream.write_all(payload).await.unwrap();
}

pub async fn read_frame(stream: &mut TcpStream) -> Vec<u8> {
    let len = tokio::time::timeout(Duration::from_secs(5), stream.read_u32())
        .await
        .expect("timed out waiting for response")
        .unwrap();
    let mut payload = vec![0u8; len as usize];
    stream.read_exact(&mut payload).await.unwrap();
    payload
}

pub async fn round_trip(stream: &mut TcpStream, payload: &[u8]) -> Vec<u8> {
    send_frame(stream, payload).await;
    read_frame(stream).await
}

/// True once the broker has closed the connection.
pub async fn is_closed(stream: &mut TcpStream) -> bool {
    let mut buf = [0u8; 16];
    match tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf)).await {
        Ok(Ok(0)) | Ok(Err(_)) => true,
        Ok(Ok(_)) | Err(_) => false,
    }
}

fn request_header(buf: &mut BytesMut, api_key: i16, api_version: i16, correlation_id: i32, flexible: bool) {
    buf.put_i16(api_key);
    buf.put_i16(api_version);
    buf.put_i32(correlation_id);
    buf.put_nullable_string(Some("kestrel-test"));
    if flexible {
        buf.put_empty_tagged_fields();
    }
}

/// ApiVersions with a header tag buffer; the body is only sent from v3 on.
pub fn api_versions_request(api_version: i16, correlation_id: i32) -> Bytes {
    let mut buf = BytesMut::new();
    request_header(&mut buf, 18, api_version, correlation_id, true);
    if api_version >= 3 {
        buf.put_compact_string("kestrel-test");
        buf.put_compact_string("0.1.0");
        buf.put_empty_tagged_fields();
    }
    buf.freeze()
}

pub fn describe_topic_partitions_request(topics: &[&str], correlation_id: i32) -> Bytes {
    let mut buf = BytesMut::new();
    request_header(&mut buf, 75, 0, correlation_id, true);
    buf.put_compact_array_len(topics.len());
    for topic in topics {
        buf.put_compact_string(topic);
        buf.put_empty_tagged_fields();
    }
    buf.put_i32(100);
    buf.put_i8(-1);
    buf.put_empty_tagged_fields();
    buf.freeze()
}

/// Fetch v16 for the given partitions of one topic id; no topics when
/// `topic_id` is `None`.
pub fn fetch_v16_request(topic_id: Option<Uuid>, partitions: &[i32], correlation_id: i32) -> Bytes {
    let mut buf = BytesMut::new();
    request_header(&mut buf, 1, 16, correlation_id, true);
    buf.put_i32(500); // max wait
    buf.put_i32(1); // min bytes
    buf.put_i32(52_428_800); // max bytes
    buf.put_i8(0);
    buf.put_i32(0); // session id
    buf.put_i32(-1); // session epoch
    match topic_id {
        None => buf.put_compact_array_len(0),
        Some(topic_id) => {
            buf.put_compact_array_len(1);
            buf.put_uuid(&topic_id);
            buf.put_compact_array_len(partitions.len());
            for &partition in partitions {
                buf.put_i32(partition);
                buf.put_i32(-1); // current leader epoch
                buf.put_i64(0); // fetch offset
                buf.put_i32(-1); // last fetched epoch
                buf.put_i64(-1); // log start offset
                buf.put_i32(1_048_576);
                buf.put_empty_tagged_fields();
            }
            buf.put_empty_tagged_fields();
        }
    }
    buf.put_compact_array_len(0); // forgotten topics
    buf.put_compact_string(""); // rack id
    buf.put_empty_tagged_fields();
    buf.freeze()
}

/// Fetch v11 (topic names, non-flexible) for one partition.
pub fn fetch_v11_request(topic: &str, partition: i32, correlation_id: i32) -> Bytes {
    let mut buf = BytesMut::new();
    request_header(&mut buf, 1, 11, correlation_id, false);
    buf.put_i32(-1); // replica id
    buf.put_i32(500);
    buf.put_i32(1);
    buf.put_i32(52_428_800);
    buf.put_i8(0);
    buf.put_i32(0);
    buf.put_i32(-1);
    buf.put_array_len(1);
    buf.put_string(topic);
    buf.put_array_len(1);
    buf.put_i32(partition);
    buf.put_i32(-1);
    buf.put_i64(0);
    buf.put_i64(-1);
    buf.put_i32(1_048_576);
    buf.put_array_len(0); // forgotten topics
    buf.put_string(""); // rack id
    buf.freeze()
}

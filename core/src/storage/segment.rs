//! On-disk layout of partition logs.
//!
//! ```text
//! <log_dir>/<topic>-<partition>/{base_offset:020}.log
//! <log_dir>/__cluster_metadata-0/00000000000000000000.log
//! ```
//!
//! Only the first segment of each partition is served.

use bytes::Bytes;
use std::io;
use std::path::{Path, PathBuf};

pub const METADATA_TOPIC: &str = "__cluster_metadata";

/// Segment file name for the segment starting at `base_offset`.
pub fn segment_file_name(base_offset: i64) -> String {
    format!("{:020}.log", base_offset)
}

pub fn partition_dir(log_dir: impl AsRef<Path>, topic: &str, partition: i32) -> PathBuf {
    log_dir.as_ref().join(format!("{}-{}", topic, partition))
}

/// Path of the first segment of a topic-partition.
pub fn partition_log_path(log_dir: impl AsRef<Path>, topic: &str, partition: i32) -> PathBuf {
    partition_dir(log_dir, topic, partition).join(segment_file_name(0))
}

/// Path of the KRaft metadata log segment under `log_dir`.
pub fn metadata_log_path(log_dir: impl AsRef<Path>) -> PathBuf {
    partition_log_path(log_dir, METADATA_TOPIC, 0)
}

/// Reads the first segment of a topic-partition verbatim.
pub async fn read_partition_log(
    log_dir: impl AsRef<Path>,
    topic: &str,
    partition: i32,
) -> io::Result<Bytes> {
    let path = partition_log_path(log_dir, topic, partition);
    tokio::fs::read(&path).await.map(Bytes::from)
}

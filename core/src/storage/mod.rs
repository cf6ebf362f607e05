//! # Storage Module
//!
//! Read-only access to the broker's on-disk state.
//!
//! ## Modules
//!
//! - [`metadata_log`] - KRaft `__cluster_metadata` record batch parsing
//! - [`index`] - Topic and partition index replayed from the metadata log
//! - [`segment`] - Partition log layout and raw segment reads

pub mod index;
pub mod metadata_log;
pub mod segment;


pub use index::{MetadataIndex, Partition, Topic};
pub use metadata_log::{
    parse_metadata_log, MetadataLogError, MetadataRecord, PartitionRecord, Record,
    RecordBatchHeader, TopicRecord,
};
pub use segment::{metadata_log_path, partition_log_path, read_partition_log};

//! # Kestrel Core Library
//!
//! Kestrel is a minimal broker that speaks the Apache Kafka wire protocol. It
//! serves topic metadata rebuilt from a KRaft `__cluster_metadata` log segment
//! and hands out raw partition log contents to fetching clients.
//!
//! ## APIs
//!
//! - **ApiVersions** (key 18, v0-v4): capability discovery
//! - **DescribeTopicPartitions** (key 75, v0): topic ids, partitions, leaders and replicas
//! - **Fetch** (key 1, v0-v16): partition logs returned verbatim as record batches
//!
//! ## Layout
//!
//! - [`broker`] - TCP server and request dispatch
//! - [`protocol`] - Kafka wire protocol framing, header and API codecs
//! - [`storage`] - Metadata log parsing, the topic index and partition log access
//! - [`config`] - Broker configuration from CLI, environment and `server.properties`
//! - [`metrics`] - Connection and request counters
//!
//! ## Running a broker
//!
//! ```rust,no_run
//! use kestrel::{BrokerConfig, BrokerServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BrokerConfig {
//!         port: 9092,
//!         log_dir: "/tmp/kraft-combined-logs".to_string(),
//!         ..Default::default()
//!     };
//!
//!     let server = BrokerServer::new(config)?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! The metadata index is built once at startup and shared read-only between
//! connections. Each connection is served by its own task, one request at a
//! time.

pub mod broker;
pub mod config;
pub mod metrics;
pub mod protocol;
pub mod storage;

pub use broker::{BrokerServer, MessageHandler};
pub use config::BrokerConfig;
pub use metrics::{BrokerMetrics, BrokerSnapshot};
pub use storage::{MetadataIndex, Partition, Topic};

use thiserror::Error;

/// Everything that can stop the broker from starting or keep a connection
/// from being served.
///
/// Startup distinguishes a corrupt metadata segment from a bad configuration:
///
/// ```rust,no_run
/// use kestrel::{BrokerConfig, BrokerServer, KestrelError};
///
/// match BrokerServer::new(BrokerConfig::default()) {
///     Ok(_) => {}
///     Err(KestrelError::MetadataLog(e)) => eprintln!("unreadable metadata segment: {}", e),
///     Err(e) => eprintln!("cannot start: {}", e),
/// }
/// ```
#[derive(Debug, Error)]
pub enum KestrelError {
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Bind, accept or socket write failures
    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Kafka codec error: {0}")]
    KafkaCodec(#[from] protocol::kafka::KafkaCodecError),

    /// Metadata log parsing errors
    #[error("Metadata log error: {0}")]
    MetadataLog(#[from] storage::MetadataLogError),
}

/// Result type alias for Kestrel operations
pub type Result<T> = std::result::Result<T, KestrelError>;

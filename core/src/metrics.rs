//! Lock-free broker counters.
//!
//! All counters use relaxed atomics; a [`BrokerSnapshot`] is a point-in-time
//! copy suitable for logging.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::protocol::kafka::{API_KEY_API_VERSIONS, API_KEY_DESCRIBE_TOPIC_PARTITIONS, API_KEY_FETCH};

#[derive(Debug, Default)]
pub struct BrokerMetrics {
    active_connections: AtomicUsize,
    total_connections: AtomicU64,
    total_requests: AtomicU64,
    api_versions_requests: AtomicU64,
    describe_topic_partitions_requests: AtomicU64,
    fetch_requests: AtomicU64,
    unknown_api_requests: AtomicU64,
    error_count: AtomicU64,
}

impl BrokerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    /// Counts one decoded request against its API.
    pub fn request_received(&self, api_key: i16) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let counter = match api_key {
            API_KEY_API_VERSIONS => &self.api_versions_requests,
            API_KEY_DESCRIBE_TOPIC_PARTITIONS => &self.describe_topic_partitions_requests,
            API_KEY_FETCH => &self.fetch_requests,
            _ => &self.unknown_api_requests,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn error_occurred(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> BrokerSnapshot {
        BrokerSnapshot {
            active_connections: self.active_connections(),
            total_connections: self.total_connections.load(Ordering::Relaxed),
            total_requests: self.total_requests(),
            api_versions_requests: self.api_versions_requests.load(Ordering::Relaxed),
            describe_topic_partitions_requests: self
                .describe_topic_partitions_requests
                .load(Ordering::Relaxed),
            fetch_requests: self.fetch_requests.load(Ordering::Relaxed),
            unknown_api_requests: self.unknown_api_requests.load(Ordering::Relaxed),
            error_count: self.error_count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokerSnapshot {
    pub active_connections: usize,
    pub total_connections: u64,
    pub total_requests: u64,
    pub api_versions_requests: u64,
    pub describe_topic_partitions_requests: u64,
    pub fetch_requests: u64,
    pub unknown_api_requests: u64,
    pub error_count: u64,
}

impl fmt::Display for BrokerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "connections={} (active {}) requests={} [api_versions={} describe_topic_partitions={} fetch={} unknown={}] errors={}",
            self.total_connections,
            self.active_connections,
            self.total_requests,
            self.api_versions_requests,
            self.describe_topic_partitions_requests,
            self.fetch_requests,
            self.unknown_api_requests,
            self.error_count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = BrokerMetrics::new();
        metrics.connection_opened();
        metrics.connection_opened();
        metrics.connection_closed();
        metrics.request_received(API_KEY_API_VERSIONS);
        metrics.request_received(API_KEY_FETCH);
        metrics.request_received(3);
        metrics.error_occurred();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.active_connections, 1);
        assert_eq!(snapshot.total_connections, 2);
        assert_eq!(snapshot.total_requests, 3);
        assert_eq!(snapshot.api_versions_requests, 1);
        assert_eq!(snapshot.describe_topic_partitions_requests, 0);
        assert_eq!(snapshot.fetch_requests, 1);
        assert_eq!(snapshot.unknown_api_requests, 1);
        assert_eq!(snapshot.error_count, 1);
        assert!(snapshot.to_string().contains("requests=3"));
    }
}

pub mod settings;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::protocol::kafka::codec::DEFAULT_MAX_FRAME_SIZE;
use crate::storage::metadata_log_path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub node_id: i32,
    /// Root directory holding partition logs and the metadata log.
    pub log_dir: String,
    /// Overrides the metadata log location derived from `log_dir`.
    pub metadata_log: Option<String>,
    pub max_frame_size: usize,
    pub max_connections: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9092,
            node_id: 1,
            log_dir: "/tmp/kraft-combined-logs".to_string(),
            metadata_log: None,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_connections: 1000,
        }
    }
}

impl BrokerConfig {
    pub fn with_log_dir(mut self, log_dir: impl Into<String>) -> Self {
        self.log_dir = log_dir.into();
        self
    }

    pub fn with_address(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// Location of the KRaft metadata log segment
    pub fn metadata_log_path(&self) -> PathBuf {
        match &self.metadata_log {
            Some(path) => PathBuf::from(path),
            None => metadata_log_path(&self.log_dir),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validate configuration bounds
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.host.is_empty() {
            return Err("host must not be empty".to_string());
        }
        if self.log_dir.is_empty() {
            return Err("log_dir must not be empty".to_string());
        }
        if self.max_frame_size == 0 {
            return Err("max_frame_size must be > 0".to_string());
        }
        if self.max_connections == 0 {
            return Err("max_connections must be > 0".to_string());
        }
        Ok(())
    }
}

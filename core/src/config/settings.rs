use super::BrokerConfig;
use crate::{KestrelError, Result};
use config::{Config, Environment};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

impl BrokerConfig {
    /// Builds a configuration from `KESTREL_*` environment variables on top of
    /// the defaults.
    pub fn from_env() -> Result<Self> {
        let settings = Config::builder()
            .add_source(Environment::with_prefix("KESTREL").try_parsing(true))
            .build()
            .map_err(|e| KestrelError::Config(e.to_string()))?;

        let config = settings
            .try_deserialize::<BrokerConfig>()
            .map_err(|e| KestrelError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Applies the settings this broker understands from a Kafka
    /// `server.properties` file: `log.dirs`, `listeners` and `node.id`.
    pub fn apply_server_properties(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let properties = parse_properties(&contents);

        if let Some(dirs) = properties.get("log.dirs").or_else(|| properties.get("log.dir")) {
            if let Some(first) = dirs.split(',').map(str::trim).find(|d| !d.is_empty()) {
                self.log_dir = first.to_string();
            }
        }

        if let Some(listeners) = properties.get("listeners") {
            if let Some(first) = listeners.split(',').next() {
                let (host, port) = parse_listener(first.trim())?;
                if !host.is_empty() {
                    self.host = host;
                }
                self.port = port;
            }
        }

        if let Some(node_id) = properties.get("node.id") {
            self.node_id = node_id
                .parse()
                .map_err(|_| KestrelError::Config(format!("invalid node.id: {}", node_id)))?;
        }

        debug!("Applied server properties from {}", path.as_ref().display());
        Ok(())
    }
}

/// `key=value` lines; `#` and `!` start comments.
fn parse_properties(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| {
            let (key, value) = line.split_once('=').or_else(|| line.split_once(':'))?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// `NAME://host:port` into its host and port.
fn parse_listener(listener: &str) -> Result<(String, u16)> {
    let address = listener
        .split_once("://")
        .map(|(_, address)| address)
        .unwrap_or(listener);
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| KestrelError::Config(format!("invalid listener: {}", listener)))?;
    let port = port
        .parse()
        .map_err(|_| KestrelError::Config(format!("invalid listener port: {}", listener)))?;
    Ok((host.to_string(), port))
}

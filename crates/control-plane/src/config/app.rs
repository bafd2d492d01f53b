//! Application configuration for the Flowplane Control Plane.

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// Environment variables are prefixed with `FLOWPLANE_`:
/// - `FLOWPLANE_SERVER_NAME`: instance name for identification
/// - `FLOWPLANE_NATS_URL`: NATS server URL (optional; events disabled without it)
/// - `FLOWPLANE_EVENT_STREAM`: JetStream stream name for lifecycle events
/// - `FLOWPLANE_DEFINITION_CACHE_TTL`: definition cache TTL in seconds
/// - `FLOWPLANE_DEBUG`: enable debug mode (default: false)
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Instance name for identification
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// NATS URL (optional)
    #[serde(default)]
    pub nats_url: Option<String>,

    /// JetStream stream name for lifecycle events
    #[serde(default = "default_event_stream")]
    pub event_stream: String,

    /// Definition cache TTL in seconds
    #[serde(default = "default_cache_ttl")]
    pub definition_cache_ttl: u64,

    /// Enable debug mode
    #[serde(default)]
    pub debug: bool,
}

fn default_server_name() -> String {
    "flowplane-control-plane".to_string()
}

fn default_event_stream() -> String {
    "flowplane_events".to_string()
}

fn default_cache_ttl() -> u64 {
    300
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables are prefixed with `FLOWPLANE_`.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("FLOWPLANE_").from_env::<AppConfig>()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_name: default_server_name(),
            nats_url: None,
            event_stream: default_event_stream(),
            definition_cache_ttl: default_cache_ttl(),
            debug: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server_name, "flowplane-control-plane");
        assert_eq!(config.definition_cache_ttl, 300);
        assert!(config.nats_url.is_none());
        assert!(!config.debug);
    }
}

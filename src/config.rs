//! Client connection settings.

use serde::{Deserialize, Serialize};

/// Largest frame accepted from a broker unless configured otherwise.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;

pub const DEFAULT_READ_BUFFER_CAPACITY: usize = 4096;

/// Settings shared by [`Connection`](crate::client::Connection) and
/// [`Session`](crate::client::Session).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Sent as the request header client id; `None` encodes a null string.
    pub client_id: Option<String>,
    /// Reported to the broker in ApiVersions v3+.
    pub client_software_name: String,
    pub client_software_version: String,
    /// Inbound frames above this size fail the connection.
    pub max_frame_size: usize,
    /// Initial capacity of the reader's accumulation buffer.
    pub read_buffer_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_id: Some(env!("CARGO_PKG_NAME").to_string()),
            client_software_name: env!("CARGO_PKG_NAME").to_string(),
            client_software_version: env!("CARGO_PKG_VERSION").to_string(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            read_buffer_capacity: DEFAULT_READ_BUFFER_CAPACITY,
        }
    }
}

impl ClientConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            ..Self::default()
        }
    }

    pub fn with_client_id(mut self, client_id: Option<String>) -> Self {
        self.client_id = client_id;
        self
    }

    pub fn with_client_software(
        mut self,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        self.client_software_name = name.into();
        self.client_software_version = version.into();
        self
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    pub fn with_read_buffer_capacity(mut self, capacity: usize) -> Self {
        self.read_buffer_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"client_id":"svc-a","max_frame_size":1024}"#).unwrap();
        assert_eq!(config.client_id.as_deref(), Some("svc-a"));
        assert_eq!(config.max_frame_size, 1024);
        assert_eq!(config.read_buffer_capacity, DEFAULT_READ_BUFFER_CAPACITY);
        assert_eq!(config.client_software_name, "thorwire");
    }

    #[test]
    fn builders_override_fields() {
        let config = ClientConfig::new("c")
            .with_client_id(None)
            .with_client_software("app", "9.9")
            .with_max_frame_size(64);
        assert_eq!(config.client_id, None);
        assert_eq!(config.client_software_version, "9.9");
        assert_eq!(config.max_frame_size, 64);
    }
}

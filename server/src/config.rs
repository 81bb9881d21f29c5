use shared::{DEFAULT_PORT, ROOM_CAPACITY};
use std::path::PathBuf;

/// Runtime settings for the room sync server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// IP address to bind to
    pub host: String,
    /// TCP port; 0 picks a free port
    pub port: u16,
    /// Maximum players per room
    pub capacity: usize,
    /// Snapshot file for player records; in-memory when `None`
    pub store_path: Option<PathBuf>,
    /// Drop every stored record before accepting connections. Turn off when
    /// the store is shared with another live server.
    pub purge_on_start: bool,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            capacity: ROOM_CAPACITY,
            store_path: None,
            purge_on_start: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.address(), "127.0.0.1:3001");
        assert_eq!(config.capacity, 6);
        assert!(config.store_path.is_none());
        assert!(config.purge_on_start);
    }

    #[test]
    fn test_address_formats_ipv6_host_verbatim() {
        let config = ServerConfig {
            host: "[::1]".to_string(),
            port: 9000,
            ..ServerConfig::default()
        };
        assert_eq!(config.address(), "[::1]:9000");
    }
}

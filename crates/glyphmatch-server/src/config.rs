use serde::Deserialize;

use glyphmatch_core::net::protocol::DEFAULT_MAX_FRAME_BYTES;

/// Top-level server configuration, loaded from `glyphmatch.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub web_root: String,
    pub limits: LimitsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            web_root: "web".to_string(),
            limits: LimitsConfig::default(),
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    /// Outbound frames buffered per connection before drops kick in.
    pub connection_message_buffer: usize,
    /// Inbound frames larger than this are discarded undecoded.
    pub max_frame_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 200,
            connection_message_buffer: 256,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl ServerConfig {
    /// Validate configuration, exiting on values the server cannot run with.
    pub fn validate(&self) {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            tracing::error!(
                addr = %self.listen_addr,
                "listen_addr is not a valid socket address"
            );
            std::process::exit(1);
        }
        if self.limits.max_ws_connections == 0 {
            tracing::error!("limits.max_ws_connections must be > 0");
            std::process::exit(1);
        }
        if self.limits.connection_message_buffer == 0 {
            tracing::error!("limits.connection_message_buffer must be > 0");
            std::process::exit(1);
        }
        if self.limits.max_frame_bytes == 0 {
            tracing::error!("limits.max_frame_bytes must be > 0");
            std::process::exit(1);
        }
    }

    /// Load config from `glyphmatch.toml` if it exists, then apply env var
    /// overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("glyphmatch.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from glyphmatch.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse glyphmatch.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No glyphmatch.toml found, using defaults");
                ServerConfig::default()
            },
        };

        if let Ok(addr) = std::env::var("GLYPHMATCH_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        if let Ok(root) = std::env::var("GLYPHMATCH_WEB_ROOT")
            && !root.is_empty()
        {
            config.web_root = root;
        }
        if let Ok(val) = std::env::var("GLYPHMATCH_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_ws_connections = n;
        }
        if let Ok(val) = std::env::var("GLYPHMATCH_MAX_FRAME_BYTES")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_frame_bytes = n;
        }

        config
    }
}

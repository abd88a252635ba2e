use std::time::Duration;

use serde::Deserialize;

// =======================================================
// SERVER (LISTENER) CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address, "host:port".
    pub listen: String,

    // Timeouts (seconds)
    pub client_read_timeout_secs: u64,

    // Limits (bytes)
    pub max_request_body_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".into(),
            client_read_timeout_secs: 15,
            max_request_body_bytes: 10 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn listen(&self) -> &str {
        &self.listen
    }

    pub fn client_read_timeout(&self) -> Duration {
        Duration::from_secs(self.client_read_timeout_secs)
    }

    pub fn max_request_body_bytes(&self) -> usize {
        usize::try_from(self.max_request_body_bytes).unwrap_or(usize::MAX)
    }

    pub(crate) fn apply_defaults_from(&mut self, defaults: &ServerConfig) {
        if self.listen.trim().is_empty() {
            self.listen = defaults.listen.clone();
        }
        if self.client_read_timeout_secs == 0 {
            self.client_read_timeout_secs = defaults.client_read_timeout_secs;
        }
        if self.max_request_body_bytes == 0 {
            self.max_request_body_bytes = defaults.max_request_body_bytes;
        }
    }
}

use std::time::Duration;

use serde::Deserialize;

// =======================================================
// UPSTREAM CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL every request is forwarded to, e.g. "http://127.0.0.1:3000".
    /// The inbound path and query are appended verbatim.
    pub url: String,

    // Timeouts (seconds)
    pub connect_timeout_secs: u64,
    /// Bounds the whole exchange: request, response head and full body.
    pub fetch_timeout_secs: u64,
    pub pool_idle_timeout_secs: u64,

    // Limits (bytes)
    pub max_response_body_bytes: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            connect_timeout_secs: 5,
            fetch_timeout_secs: 30,
            pool_idle_timeout_secs: 60,
            max_response_body_bytes: 10 * 1024 * 1024,
        }
    }
}

impl UpstreamConfig {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn pool_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_idle_timeout_secs)
    }

    pub fn max_response_body_bytes(&self) -> usize {
        usize::try_from(self.max_response_body_bytes).unwrap_or(usize::MAX)
    }

    pub(crate) fn apply_defaults_from(&mut self, defaults: &UpstreamConfig) {
        self.url = self.url.trim().to_string();
        if self.connect_timeout_secs == 0 {
            self.connect_timeout_secs = defaults.connect_timeout_secs;
        }
        if self.fetch_timeout_secs == 0 {
            self.fetch_timeout_secs = defaults.fetch_timeout_secs;
        }
        if self.pool_idle_timeout_secs == 0 {
            self.pool_idle_timeout_secs = defaults.pool_idle_timeout_secs;
        }
        if self.max_response_body_bytes == 0 {
            self.max_response_body_bytes = defaults.max_response_body_bytes;
        }
    }
}

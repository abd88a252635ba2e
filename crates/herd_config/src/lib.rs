mod cache;
mod global;
mod herd;
mod server;
mod upstream;
mod validation;

pub use cache::CacheConfig;
pub use global::GlobalConfig;
pub use herd::{EnvOverrides, HerdConfig, DEFAULT_CONFIG_FILE};
pub use server::ServerConfig;
pub use upstream::UpstreamConfig;
pub use validation::ConfigReport;

/// Fatal startup configuration problems.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration\n{0}")]
    Invalid(String),
}

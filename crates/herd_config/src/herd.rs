use serde::Deserialize;

use crate::validation::{validate, ConfigReport};
use crate::{CacheConfig, ConfigError, GlobalConfig, ServerConfig, UpstreamConfig};

/// Default config file looked up when no path is given on the command line.
pub const DEFAULT_CONFIG_FILE: &str = "herd.conf";

// =======================================================
// ENVIRONMENT OVERRIDES
// =======================================================
/// Settings taken from the process environment. They win over the file.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    /// `TARGET_SERVER_URL` -> `upstream.url`
    pub target_server_url: Option<String>,
    /// `PORT` -> `server.listen = 0.0.0.0:$PORT`
    pub port: Option<String>,
    /// `CACHE_TTL_SECS` -> `cache.ttl_secs`
    pub cache_ttl_secs: Option<String>,
}

impl EnvOverrides {
    /// Reads the process environment. A `.env` file loaded beforehand
    /// (see the binary) is already part of it.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the overrides from any name -> value source. Blank values
    /// count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            target_server_url: var("TARGET_SERVER_URL"),
            port: var("PORT"),
            cache_ttl_secs: var("CACHE_TTL_SECS"),
        }
    }
}

// =======================================================
// HERD CONFIG (main config)
// =======================================================
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HerdConfig {
    #[serde(default)]
    pub global: GlobalConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

impl HerdConfig {
    pub fn global(&self) -> &GlobalConfig {
        &self.global
    }

    pub fn server(&self) -> &ServerConfig {
        &self.server
    }

    pub fn upstream(&self) -> &UpstreamConfig {
        &self.upstream
    }

    pub fn cache(&self) -> &CacheConfig {
        &self.cache
    }

    /// Validate the configuration and return a report of warnings and errors.
    pub fn validate(&self) -> ConfigReport {
        validate(self)
    }

    /// Load `file_name` (optional, INI) and apply the process environment.
    pub fn load(file_name: &str) -> Result<Self, ConfigError> {
        Self::load_with(file_name, &EnvOverrides::from_env())
    }

    /// Load `file_name` (optional, INI), apply `env`, fill defaults and
    /// validate. Validation errors are fatal; warnings are left for the caller
    /// to report once logging is up (see [`HerdConfig::validate`]).
    pub fn load_with(file_name: &str, env: &EnvOverrides) -> Result<Self, ConfigError> {
        let listen = env.port.as_deref().map(|port| format!("0.0.0.0:{port}"));

        let built = config::Config::builder()
            .add_source(config::File::new(file_name, config::FileFormat::Ini).required(false))
            .set_override_option("upstream.url", env.target_server_url.clone())?
            .set_override_option("server.listen", listen)?
            .set_override_option("cache.ttl_secs", env.cache_ttl_secs.clone())?
            .build()?;

        let mut cfg: HerdConfig = built.try_deserialize()?;
        cfg.apply_defaults();

        let report = cfg.validate();
        if report.has_errors() {
            return Err(ConfigError::Invalid(report.format()));
        }

        Ok(cfg)
    }

    pub(crate) fn apply_defaults(&mut self) {
        self.global.apply_defaults_from(&GlobalConfig::default());
        self.server.apply_defaults_from(&ServerConfig::default());
        self.upstream.apply_defaults_from(&UpstreamConfig::default());
        self.cache.apply_defaults_from(&CacheConfig::default());
    }

    pub fn print(&self) {
        println!("================ HERD CONFIG ================");
        self.print_global();
        self.print_server();
        self.print_upstream();
        self.print_cache();
        println!("=============================================");
    }

    fn print_global(&self) {
        println!("\n[global]");
        println!("  worker_connections   = {}", self.global.worker_connections);
        println!("  log_level            = {}", self.global.log_level);
    }

    fn print_server(&self) {
        println!("\n[server]");
        println!("  listen                   = {}", self.server.listen);
        println!(
            "  client_read_timeout_secs = {}",
            self.server.client_read_timeout_secs
        );
        println!(
            "  max_request_body_bytes   = {}",
            self.server.max_request_body_bytes
        );
    }

    fn print_upstream(&self) {
        println!("\n[upstream]");
        println!("  url                     = {}", self.upstream.url);
        println!(
            "  connect_timeout_secs    = {}",
            self.upstream.connect_timeout_secs
        );
        println!(
            "  fetch_timeout_secs      = {}",
            self.upstream.fetch_timeout_secs
        );
        println!(
            "  pool_idle_timeout_secs  = {}",
            self.upstream.pool_idle_timeout_secs
        );
        println!(
            "  max_response_body_bytes = {}",
            self.upstream.max_response_body_bytes
        );
    }

    fn print_cache(&self) {
        println!("\n[cache]");
        println!("  ttl_secs = {}", self.cache.ttl_secs);
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn temp_conf(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("herd-{}-{name}.conf", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn env_with_url(url: &str) -> EnvOverrides {
        EnvOverrides {
            target_server_url: Some(url.to_string()),
            ..EnvOverrides::default()
        }
    }

    #[test]
    fn missing_file_uses_defaults_plus_env() {
        let cfg = HerdConfig::load_with(
            "/nonexistent/herd.conf",
            &env_with_url("http://127.0.0.1:3000"),
        )
        .expect("valid config");

        assert_eq!(cfg.upstream.url, "http://127.0.0.1:3000");
        assert_eq!(cfg.server.listen, "0.0.0.0:8080");
        assert_eq!(cfg.cache.ttl_secs, 120);
        assert_eq!(cfg.upstream.fetch_timeout_secs, 30);
        assert_eq!(cfg.global.worker_connections, 1024);
    }

    #[test]
    fn missing_upstream_url_is_fatal() {
        let err = HerdConfig::load_with("/nonexistent/herd.conf", &EnvOverrides::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("upstream.url"));
    }

    #[test]
    fn file_values_are_read_and_zeroes_fall_back_to_defaults() {
        let path = temp_conf(
            "file-values",
            "[server]\nlisten = 127.0.0.1:9000\n\n[upstream]\nurl = http://backend:8081\nfetch_timeout_secs = 0\n\n[cache]\nttl_secs = 5\n",
        );
        let cfg = HerdConfig::load_with(path.to_str().unwrap(), &EnvOverrides::default())
            .expect("valid config");
        std::fs::remove_file(&path).ok();

        assert_eq!(cfg.server.listen, "127.0.0.1:9000");
        assert_eq!(cfg.upstream.url, "http://backend:8081");
        assert_eq!(cfg.upstream.fetch_timeout_secs, 30);
        assert_eq!(cfg.cache.ttl_secs, 5);
    }

    #[test]
    fn env_overrides_win_over_file() {
        let path = temp_conf(
            "env-wins",
            "[server]\nlisten = 127.0.0.1:9000\n\n[upstream]\nurl = http://backend:8081\n",
        );
        let env = EnvOverrides {
            target_server_url: Some("http://other:9999".into()),
            port: Some("7070".into()),
            cache_ttl_secs: Some("42".into()),
        };
        let cfg = HerdConfig::load_with(path.to_str().unwrap(), &env).expect("valid config");
        std::fs::remove_file(&path).ok();

        assert_eq!(cfg.upstream.url, "http://other:9999");
        assert_eq!(cfg.server.listen, "0.0.0.0:7070");
        assert_eq!(cfg.cache.ttl_secs, 42);
    }

    #[test]
    fn dotenv_file_feeds_the_overrides() {
        let path = std::env::temp_dir().join(format!("herd-{}.env", std::process::id()));
        std::fs::write(
            &path,
            "# local dev\nTARGET_SERVER_URL=\"http://127.0.0.1:3000\"\nexport PORT=9090\nCACHE_TTL_SECS=\n",
        )
        .unwrap();
        let vars: std::collections::HashMap<String, String> = dotenvy::from_path_iter(&path)
            .unwrap()
            .map(Result::unwrap)
            .collect();
        std::fs::remove_file(&path).ok();

        let env = EnvOverrides::from_lookup(|name| vars.get(name).cloned());
        assert_eq!(env.target_server_url.as_deref(), Some("http://127.0.0.1:3000"));
        assert_eq!(env.port.as_deref(), Some("9090"));
        assert_eq!(env.cache_ttl_secs, None);

        let cfg = HerdConfig::load_with("/nonexistent/herd.conf", &env).expect("valid config");
        assert_eq!(cfg.server.listen, "0.0.0.0:9090");
        assert_eq!(cfg.cache.ttl_secs, 120);
    }
}

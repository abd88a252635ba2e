use std::net::SocketAddr;

use http::Uri;

use crate::HerdConfig;

/// Validation output for a loaded herd configuration.
#[derive(Debug, Default)]
pub struct ConfigReport {
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl ConfigReport {
    /// Returns true when no errors were found.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns true when at least one error was found.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns the collected warning messages.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Returns the collected error messages.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Render warnings and errors into a readable, multi-line string.
    pub fn format(&self) -> String {
        let mut out = String::new();
        if !self.errors.is_empty() {
            out.push_str("Errors:\n");
            for err in &self.errors {
                out.push_str("  - ");
                out.push_str(err);
                out.push('\n');
            }
        }
        if !self.warnings.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("Warnings:\n");
            for warn in &self.warnings {
                out.push_str("  - ");
                out.push_str(warn);
                out.push('\n');
            }
        }
        out
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }
}

/// Validate a herd configuration and return a report of issues.
pub fn validate(cfg: &HerdConfig) -> ConfigReport {
    let mut report = ConfigReport::default();

    validate_server(cfg, &mut report);
    validate_upstream(cfg, &mut report);
    validate_cache(cfg, &mut report);

    report
}

fn validate_server(cfg: &HerdConfig, report: &mut ConfigReport) {
    let listen = cfg.server.listen.trim();
    if listen.is_empty() {
        report.error("server.listen is empty");
    } else if listen.parse::<SocketAddr>().is_err() {
        report.warn(format!(
            "server.listen '{listen}' is not a socket address; DNS resolution will be used"
        ));
    }
}

fn validate_upstream(cfg: &HerdConfig, report: &mut ConfigReport) {
    let url = cfg.upstream.url.trim();
    if url.is_empty() {
        report.error("upstream.url is required (set TARGET_SERVER_URL or [upstream] url)");
        return;
    }

    let uri = match url.parse::<Uri>() {
        Ok(uri) => uri,
        Err(e) => {
            report.error(format!("upstream.url '{url}' is not a valid URL: {e}"));
            return;
        }
    };

    match uri.scheme_str() {
        Some("http") => {}
        Some(other) => report.error(format!(
            "upstream.url '{url}' uses scheme '{other}'; only http:// upstreams are supported"
        )),
        None => report.error(format!(
            "upstream.url '{url}' must be absolute, e.g. http://host:port"
        )),
    }

    if uri.authority().is_none() {
        report.error(format!("upstream.url '{url}' has no host"));
    }

    if uri.query().is_some() {
        report.error(format!(
            "upstream.url '{url}' must not carry a query string; inbound queries are appended"
        ));
    }

    if url.ends_with('/') {
        report.warn(format!(
            "upstream.url '{url}' ends with '/'; forwarded paths will start with '//'"
        ));
    }

    if cfg.upstream.fetch_timeout_secs < cfg.upstream.connect_timeout_secs {
        report.warn(format!(
            "upstream.fetch_timeout_secs ({}) is shorter than connect_timeout_secs ({}); connects will be cut short",
            cfg.upstream.fetch_timeout_secs, cfg.upstream.connect_timeout_secs
        ));
    }
}

fn validate_cache(cfg: &HerdConfig, report: &mut ConfigReport) {
    if cfg.cache.ttl_secs > 24 * 60 * 60 {
        report.warn(format!(
            "cache.ttl_secs is {}; entries are only evicted when looked up after expiry",
            cfg.cache.ttl_secs
        ));
    }
}

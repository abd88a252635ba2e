use std::time::Duration;

use herd_cache::Abandoned;

/// Why a fetch produced no cache entry.
///
/// Every variant is local to the request (and its followers): it becomes a
/// 502 and nothing is cached.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to create target request")]
    Build(#[source] http::Error),

    #[error("failed to make request")]
    Network(#[source] hyper_util::client::legacy::Error),

    #[error("upstream did not answer within {0:?}")]
    Timeout(Duration),

    #[error("failed to read response body")]
    Body(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("failed to decode gzip response body")]
    Decode(#[source] std::io::Error),

    #[error("upstream fetch was abandoned before completing")]
    Abandoned,
}

impl From<Abandoned> for FetchError {
    fn from(_: Abandoned) -> Self {
        FetchError::Abandoned
    }
}

impl FetchError {
    /// One-line description including every source in the chain, suitable
    /// for a 502 body.
    pub fn report(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            out.push_str(": ");
            out.push_str(&err.to_string());
            source = err.source();
        }
        out
    }
}

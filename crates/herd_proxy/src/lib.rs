mod decode;
mod error;
mod fetcher;
mod headers;
mod path;

pub use error::FetchError;
pub use fetcher::UpstreamFetcher;

pub mod responses;

pub use responses::{CacheStatus, HttpResponse};

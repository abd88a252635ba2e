pub mod handler;
pub mod master;

pub use handler::{FetchOutcome, Handler};
pub use master::Master;

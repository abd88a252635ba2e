use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::info;

use super::Master;

impl Master {
    pub(super) fn log_startup(&self) {
        info!(target: "herd::master", "Starting HERD MASTER");
        info!(
            target: "herd::master",
            upstream = %self.cfg.upstream.url,
            ttl_secs = self.cfg.cache.ttl_secs,
            fetch_timeout_secs = self.cfg.upstream.fetch_timeout_secs,
            "Caching proxy configured"
        );
    }

    pub(super) fn init_semaphore(&self) -> Arc<Semaphore> {
        let max_conns = self.cfg.global.worker_connections() as usize;
        let semaphore = Arc::new(Semaphore::new(max_conns));
        info!(
            target: "herd::master",
            max_conns,
            "Global connection semaphore initialized"
        );
        semaphore
    }
}

use std::sync::Arc;

use herd_config::HerdConfig;
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::handler::Handler;

mod accept;
mod startup;

use accept::{accept_loop, bind_listener};

/// Owns the configuration and the shared handler; binds the listener and
/// runs the accept loop.
pub struct Master {
    cfg: Arc<HerdConfig>,
    handler: Arc<Handler>,
}

impl Master {
    pub fn new(cfg: HerdConfig) -> Self {
        let handler = Arc::new(Handler::from_config(&cfg));
        Self {
            cfg: Arc::new(cfg),
            handler,
        }
    }

    pub fn handler(&self) -> &Arc<Handler> {
        &self.handler
    }

    /// Bind `server.listen` and serve until the accept loop fails.
    #[instrument(skip(self), fields(
        listen = %self.cfg.server.listen,
        upstream = %self.cfg.upstream.url,
        worker_connections = %self.cfg.global.worker_connections,
    ))]
    pub async fn run(self) -> anyhow::Result<()> {
        self.log_startup();
        let listener = bind_listener(self.cfg.server.listen()).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        let listen_addr = match listener.local_addr() {
            Ok(addr) => addr.to_string(),
            Err(_) => self.cfg.server.listen.clone(),
        };
        let semaphore = self.init_semaphore();

        info!(
            target: "herd::master",
            listen = %listen_addr,
            "Master initialized. Waiting for incoming connections (Ctrl+C to stop)..."
        );

        accept_loop(
            listener,
            listen_addr,
            semaphore,
            self.handler,
            self.cfg.server.client_read_timeout(),
        )
        .await
    }
}

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::Request;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{Instrument, debug, error, info, instrument, warn};

use crate::handler::Handler;

pub(crate) async fn bind_listener(listen_addr: &str) -> anyhow::Result<TcpListener> {
    info!(target: "herd::master", listen = %listen_addr, "Binding listener");

    match TcpListener::bind(listen_addr).await {
        Ok(listener) => {
            info!(target: "herd::master", listen = %listen_addr, "Bind() successful");
            Ok(listener)
        }
        Err(e) => {
            error!(
                target: "herd::master",
                listen = %listen_addr,
                error = ?e,
                "Failed to bind listener"
            );
            Err(anyhow::Error::new(e).context(format!("failed to bind {listen_addr}")))
        }
    }
}

/// Pause after an accept failure caused by fd or memory exhaustion, so the
/// loop does not spin while nothing can be accepted.
const EXHAUSTION_BACKOFF: Duration = Duration::from_millis(100);

/// ENOMEM, ENFILE and EMFILE.
fn is_resource_exhaustion(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::OutOfMemory || matches!(e.raw_os_error(), Some(12 | 23 | 24))
}

struct AcceptedConn {
    stream: TcpStream,
    addr: SocketAddr,
    permit: OwnedSemaphorePermit,
}

/// Waits for a connection permit first, so a saturated proxy stops
/// accepting instead of queueing sockets it cannot serve. Only a closed
/// semaphore is an error; failed accepts are logged and retried.
async fn accept_with_permit(
    listener: &TcpListener,
    listen_addr: &str,
    semaphore: &Arc<Semaphore>,
) -> anyhow::Result<AcceptedConn> {
    let permit = match semaphore.clone().acquire_owned().await {
        Ok(p) => p,
        Err(e) => {
            error!(
                target: "herd::master",
                listen = %listen_addr,
                error = ?e,
                "Failed to acquire connection permit"
            );
            return Err(e.into());
        }
    };

    // Accept failures only cost this attempt; the permit is kept for the
    // next one.
    let (stream, addr) = loop {
        match listener.accept().await {
            Ok(pair) => break pair,
            Err(e) if is_resource_exhaustion(&e) => {
                error!(
                    target: "herd::master",
                    listen = %listen_addr,
                    error = ?e,
                    backoff_ms = EXHAUSTION_BACKOFF.as_millis() as u64,
                    "Out of descriptors or memory while accepting, backing off"
                );
                tokio::time::sleep(EXHAUSTION_BACKOFF).await;
            }
            Err(e) => {
                warn!(
                    target: "herd::master",
                    listen = %listen_addr,
                    error = ?e,
                    "Failed to accept connection"
                );
            }
        }
    };

    debug!(
        target: "herd::master",
        listen = %listen_addr,
        client_addr = %addr,
        available_permits = semaphore.available_permits(),
        "Connection accepted"
    );

    Ok(AcceptedConn {
        stream,
        addr,
        permit,
    })
}

#[instrument(
    skip(listener, semaphore, handler),
    fields(
        listen = %listen_addr,
        available_permits = semaphore.available_permits(),
    )
)]
pub(crate) async fn accept_loop(
    listener: TcpListener,
    listen_addr: String,
    semaphore: Arc<Semaphore>,
    handler: Arc<Handler>,
    header_read_timeout: Duration,
) -> anyhow::Result<()> {
    info!(
        target: "herd::master",
        listen = %listen_addr,
        "accept_loop started for listening socket"
    );

    loop {
        let AcceptedConn {
            stream,
            addr,
            permit,
        } = accept_with_permit(&listener, &listen_addr, &semaphore).await?;

        let handler = handler.clone();
        let span = tracing::info_span!("worker_connection", client_addr = %addr);

        tokio::spawn(
            async move {
                let _permit = permit;
                debug!(target: "herd::worker", "Worker spawned for incoming connection");

                if let Err(e) = serve_connection(stream, handler, header_read_timeout).await {
                    debug!(
                        target: "herd::worker",
                        client_addr = %addr,
                        error = ?e,
                        "Connection closed with an error"
                    );
                } else {
                    debug!(
                        target: "herd::worker",
                        client_addr = %addr,
                        "Connection handled successfully"
                    );
                }
            }
            .instrument(span),
        );
    }
}

/// One HTTP/1.1 connection (keep-alive) driven by hyper; every request goes
/// through the shared handler.
async fn serve_connection(
    stream: TcpStream,
    handler: Arc<Handler>,
    header_read_timeout: Duration,
) -> Result<(), hyper::Error> {
    let service = service_fn(move |req: Request<Incoming>| {
        let handler = handler.clone();
        async move { Ok::<_, Infallible>(handler.handle(req).await) }
    });

    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .header_read_timeout(header_read_timeout);

    builder
        .serve_connection(TokioIo::new(stream), service)
        .await
}

//! HTTPS server loop
//!
//! Serves an axum [`Router`] over TLS on an already-bound listener. Runs in
//! the background; everything that goes wrong after [`spawn_tls`] returns is
//! logged, never propagated.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use hyper::body::Incoming;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower::Service;
use tracing::{debug, error, info};

use kvmrelay_common::Result;

use crate::tls::TlsAcceptor;

/// Back-off after a failed `accept`, e.g. when out of file descriptors
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Handle to a running HTTPS server
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting and wait until the listening socket is closed.
    ///
    /// Open connections are asked to shut down gracefully; requests already
    /// being handled run to completion in the background.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            error!("HTTPS accept loop for {} ended abnormally: {}", self.local_addr, e);
        }
    }
}

/// Start serving `router` over TLS on `listener` in a background task.
pub fn spawn_tls(listener: TcpListener, acceptor: TlsAcceptor, router: Router) -> Result<ServerHandle> {
    let local_addr = listener.local_addr()?;
    let shutdown = CancellationToken::new();

    info!("HTTPS relay listening on {}", local_addr);

    let task = tokio::spawn(accept_loop(listener, acceptor, router, shutdown.clone()));

    Ok(ServerHandle {
        local_addr,
        shutdown,
        task,
    })
}

async fn accept_loop(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    router: Router,
    shutdown: CancellationToken,
) {
    let local_addr = listener.local_addr().ok();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(serve_connection(
                        stream,
                        peer,
                        acceptor.clone(),
                        router.clone(),
                        shutdown.clone(),
                    ));
                }
                Err(e) => {
                    error!("HTTPS accept failed on {:?}: {}", local_addr, e);
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            },
        }
    }

    drop(listener);
    info!("HTTPS relay on {:?} stopped accepting", local_addr);
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    acceptor: TlsAcceptor,
    router: Router,
    shutdown: CancellationToken,
) {
    let tls_stream = match acceptor.accept(stream).await {
        Ok(s) => s,
        Err(e) => {
            debug!("TLS handshake with {} failed: {}", peer, e);
            return;
        }
    };

    let service = hyper::service::service_fn(move |request: Request<Incoming>| {
        router.clone().call(request)
    });

    let builder = Builder::new(TokioExecutor::new());
    let conn = builder.serve_connection(TokioIo::new(tls_stream), service);
    tokio::pin!(conn);

    tokio::select! {
        result = conn.as_mut() => {
            if let Err(e) = result {
                debug!("Connection from {} ended with error: {}", peer, e);
            }
        }
        _ = shutdown.cancelled() => {
            conn.as_mut().graceful_shutdown();
            if let Err(e) = conn.as_mut().await {
                debug!("Connection from {} failed while draining: {}", peer, e);
            }
        }
    }
}

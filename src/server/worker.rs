/*
 * worker.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of uhttpmock, a mock HTTP/HTTPS server for testing network clients.
 *
 * uhttpmock is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * uhttpmock is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with uhttpmock.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Dedicated worker thread driving the listener's event loop. The listener
//! itself is not thread-safe, so every accept/request/TLS operation happens
//! here; the foreground only posts a shutdown signal and joins.

use std::net::{Ipv4Addr, Ipv6Addr, TcpListener as StdTcpListener};
use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_rustls::TlsAcceptor;

use super::error::ServerError;
use super::handler;
use super::SharedState;

/// Owns the shutdown signal and the thread handle. `stop()` consumes it:
/// posting shutdown and joining are a single irreversible step, mirroring
/// `uhm_server_stop()`'s synchronous join of the worker thread started by
/// `uhm_server_run()`.
pub struct WorkerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    join_handle: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Dual-stack first, falling back to IPv4-only — matching
/// `uhm_server_run`'s bind fallback over a loopback, OS-chosen port.
pub fn bind_loopback() -> Result<StdTcpListener, ServerError> {
    if let Ok(listener) = StdTcpListener::bind((Ipv6Addr::LOCALHOST, 0)) {
        return Ok(listener);
    }
    Ok(StdTcpListener::bind((Ipv4Addr::LOCALHOST, 0))?)
}

/// Spawn the worker thread, owning a fresh multi-thread `tokio::Runtime` for
/// the lifetime of this `run()`/`stop()` pair (the worker thread itself is
/// transient, so the runtime is rebuilt each time rather than reused).
pub fn spawn(
    std_listener: StdTcpListener,
    tls: Option<Arc<rustls::ServerConfig>>,
    shared: Arc<SharedState>,
) -> Result<WorkerHandle, ServerError> {
    std_listener.set_nonblocking(true)?;
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let join_handle = thread::Builder::new()
        .name("uhttpmock-worker".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(_) => return,
            };
            runtime.block_on(accept_loop(std_listener, tls, shared, shutdown_rx));
        })
        .map_err(|e| ServerError::Io(std::io::Error::other(e.to_string())))?;

    Ok(WorkerHandle {
        shutdown_tx: Some(shutdown_tx),
        join_handle: Some(join_handle),
    })
}

async fn accept_loop(
    std_listener: StdTcpListener,
    tls: Option<Arc<rustls::ServerConfig>>,
    shared: Arc<SharedState>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let listener = match TcpListener::from_std(std_listener) {
        Ok(l) => l,
        Err(_) => return,
    };
    let acceptor = tls.map(TlsAcceptor::from);

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            accepted = listener.accept() => {
                let (stream, _peer) = match accepted {
                    Ok(pair) => pair,
                    Err(_) => continue,
                };
                let shared = Arc::clone(&shared);
                let acceptor = acceptor.clone();
                tokio::spawn(async move {
                    let _ = serve_connection(stream, acceptor, shared).await;
                });
            }
        }
    }
}

async fn serve_connection(
    stream: tokio::net::TcpStream,
    acceptor: Option<TlsAcceptor>,
    shared: Arc<SharedState>,
) -> Result<(), ServerError> {
    let service = service_fn(move |req: Request<Incoming>| {
        let shared = Arc::clone(&shared);
        async move { Ok::<_, std::convert::Infallible>(handle_request(req, shared).await) }
    });

    match acceptor {
        Some(acceptor) => {
            let tls_stream = acceptor.accept(stream).await?;
            http1::Builder::new()
                .serve_connection(TokioIo::new(tls_stream), service)
                .await
                .map_err(|e| ServerError::Io(std::io::Error::other(e.to_string())))?;
        }
        None => {
            http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
                .map_err(|e| ServerError::Io(std::io::Error::other(e.to_string())))?;
        }
    }
    Ok(())
}

/// `process_request` pre-parses the trace's next record off disk the first
/// time it's needed, so it's run via `spawn_blocking` and joined here rather
/// than called directly — a slow or contended trace file must not stall this
/// connection's async worker thread while other connections are in flight.
async fn handle_request(req: Request<Incoming>, shared: Arc<SharedState>) -> Response<Full<Bytes>> {
    let base = shared.base_uri();
    let handled = match super::message_from_request(req, &base).await {
        Ok(actual) => {
            let shared = Arc::clone(&shared);
            tokio::task::spawn_blocking(move || shared.process_request(&actual))
                .await
                .unwrap_or_else(|_| {
                    handler::handle_parse_error(&ServerError::Io(std::io::Error::other(
                        "trace processing task panicked",
                    )))
                })
        }
        Err(e) => handler::handle_parse_error(&e),
    };
    super::response_from_handled(handled)
}

//! HTTP server and graceful shutdown.
//!
//! Every request becomes a [`Request`] reader built with the server's
//! [`ReaderConfig`] and [`ServerEnv`], is matched against the [`Router`], and
//! runs inside a `request` tracing span that records method, path, client
//! address and device type.
//!
//! On SIGTERM or Ctrl-C the server stops accepting, lets in-flight
//! connections finish, then returns from [`Server::serve`].

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{Instrument, error, info, info_span, warn};

use crate::config::ReaderConfig;
use crate::env::ServerEnv;
use crate::error::Error;
use crate::http_reader::{ConnectionInfo, Request};
use crate::reader::RequestReader;
use crate::response::{IntoResponse, Response};
use crate::router::Router;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
    config: ReaderConfig,
    env: ServerEnv,
}

/// Shared, read-only state of a running server.
struct Shared {
    router: Router,
    config: ReaderConfig,
    env: ServerEnv,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called. The script reported by readers defaults to the running
    /// executable.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    ///
    /// ```rust,no_run
    /// use inbound::Server;
    /// let server = Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self { addr, config: ReaderConfig::default(), env: ServerEnv::current_process() }
    }

    /// Trust and body-size policy for every request.
    pub fn config(mut self, config: ReaderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn env(mut self, env: ServerEnv) -> Self {
        self.env = env;
        self
    }

    /// Binds and serves until SIGTERM or Ctrl-C, then drains.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve_with_shutdown(listener, router, shutdown_signal()).await
    }

    /// Serves on an already-bound listener until `signal` resolves, then
    /// drains in-flight connections. The configured address is ignored.
    pub async fn serve_with_shutdown(
        self,
        listener: TcpListener,
        router: Router,
        signal: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let local_addr = listener.local_addr()?;
        let shared = Arc::new(Shared { router, config: self.config, env: self.env });

        info!(addr = %local_addr, "inbound listening");

        let mut tasks = tokio::task::JoinSet::new();
        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Check shutdown first so a signal stops accepting immediately.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let shared = Arc::clone(&shared);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        let svc = service_fn(move |req| {
                            let shared = Arc::clone(&shared);
                            async move { dispatch(shared, req, remote_addr).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("inbound stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Builds the reader, resolves the route and runs the handler. Failures
/// become responses, so hyper never sees an error.
async fn dispatch(
    shared: Arc<Shared>,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> Result<Response, Infallible> {
    let method = req.method().clone();
    let reader = match Request::new(req, ConnectionInfo::plain(remote_addr), &shared.config, &shared.env) {
        Ok(reader) => reader,
        Err(e) => {
            warn!(peer = %remote_addr, %method, "rejected request: {e}");
            return Ok(e.into_response());
        }
    };

    let span = info_span!(
        "request",
        method = reader.method(),
        path = reader.path(),
        client_ip = %reader.client_ip(),
        device = reader.client_device_type_name(),
    );

    let response = async move {
        let response = match shared.router.lookup(&method, reader.raw_path()) {
            Some((handler, route)) => {
                // The dispatcher owns the route; the reader only observes it.
                let route = Arc::new(route);
                match reader.set_route(&route) {
                    Ok(()) => handler.call(reader).await,
                    Err(e) => e.into_response(),
                }
            }
            None => http::StatusCode::NOT_FOUND.into_response(),
        };
        info!(status = response.status().as_u16(), "request completed");
        response
    }
    .instrument(span)
    .await;

    Ok(response)
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on SIGTERM (Unix) or Ctrl-C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

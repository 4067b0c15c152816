//! HTTP server, admission control, and graceful shutdown.
//!
//! # Graceful shutdown and Kubernetes
//!
//! When Kubernetes terminates a pod it sends **SIGTERM** and waits
//! `terminationGracePeriodSeconds` (default 30 s) before sending SIGKILL.
//!
//! The server reacts by:
//! 1. Immediately stopping `listener.accept()` — no new connections are made.
//! 2. Letting every in-flight connection task run to completion.
//! 3. Returning from [`Server::serve`], which lets `main` exit cleanly.
//!
//! # Admission control
//!
//! [`Server::max_conns_per_ip`] caps concurrent connections per client
//! address. The check runs at accept time, before any routing or middleware:
//! a connection over the cap is dropped, never queued. Behind a reverse
//! proxy every connection shares the proxy's address — only enable the cap
//! when clients connect directly.
//!
//! # Cancellation
//!
//! If the client closes the connection mid-request, hyper drops the dispatch
//! future. The remaining middleware and handler are abandoned at their next
//! await point and the context is released; no response is attempted.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};

use http_body_util::BodyExt;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::method::Method;
use crate::response::Response;
use crate::router::Router;
use crate::status::Status;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
    max_conns_per_ip: Option<usize>,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use rove::Server;
    /// let server = Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self { addr, max_conns_per_ip: None }
    }

    /// Caps concurrent connections per originating IP. Unset means unlimited.
    pub fn max_conns_per_ip(mut self, cap: usize) -> Self {
        self.max_conns_per_ip = Some(cap);
        self
    }

    /// Starts accepting connections and dispatching them through `router`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;

        // Arc so the routing table is shared across connection tasks without
        // copying; it is never written after this point.
        let router = Arc::new(router);
        let admissions = Admissions::new(self.max_conns_per_ip);

        info!(addr = %self.addr, "rove listening");

        // JoinSet tracks every spawned connection task so we can wait for
        // them all to finish during graceful shutdown.
        let mut tasks = tokio::task::JoinSet::new();

        // Pin the shutdown future so we can poll it in a loop.
        // Futures in Rust must not move in memory after the first poll — that
        // is what `Pin` enforces. `tokio::pin!` pins the future on the stack.
        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // `biased` makes select! check arms top-to-bottom instead of
                // randomly. We check shutdown first so a SIGTERM immediately
                // stops accepting new connections, even if more are queued.
                biased;

                () = &mut shutdown => {
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

                    // Admission check before any dispatch work. Dropping the
                    // stream rejects the connection; nothing queues.
                    let Some(admission) = admissions.admit(remote_addr.ip()) else {
                        warn!(peer = %remote_addr, "connection cap reached, rejecting");
                        continue;
                    };

                    let router = Arc::clone(&router);
                    // TokioIo adapts tokio's AsyncRead/AsyncWrite to the hyper
                    // IO traits.
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Held for the life of the connection; releases the
                        // per-IP slot on drop.
                        let _admission = admission;

                        // `service_fn` turns a plain async function into a
                        // hyper `Service`. The closure is called once per
                        // request on the connection, not once per connection.
                        let svc = service_fn(move |req| {
                            let router = Arc::clone(&router);
                            async move { dispatch(router, req).await }
                        });

                        // `auto::Builder` transparently handles both HTTP/1.1
                        // and HTTP/2 — whatever the client negotiates.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        // Drain: wait for every in-flight connection to finish before we return.
        while tasks.join_next().await.is_some() {}

        info!("rove stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Bridges one hyper request onto [`Router::dispatch`].
///
/// The error type is [`Infallible`](std::convert::Infallible) — every
/// failure is handled internally (404, 405, 400) so hyper never sees an
/// error from us.
async fn dispatch(
    router: Arc<Router>,
    req: hyper::Request<hyper::body::Incoming>,
) -> Result<http::Response<http_body_util::Full<bytes::Bytes>>, std::convert::Infallible> {
    let Ok(method) = req.method().as_str().parse::<Method>() else {
        return Ok(Response::status(Status::MethodNotAllowed).into_http());
    };

    let path = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());

    let headers = req
        .headers()
        .iter()
        .map(|(k, v)| {
            (k.as_str().to_owned(), String::from_utf8_lossy(v.as_bytes()).into_owned())
        })
        .collect();

    // Buffer the body up front; handlers see complete bytes. A stream error
    // here means the client stopped sending mid-body.
    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!("body read failed: {e}");
            return Ok(Response::status(Status::BadRequest).into_http());
        }
    };

    Ok(router.dispatch(method, &path, headers, body).await.into_http())
}

// ── Admission control ─────────────────────────────────────────────────────────

/// Per-IP concurrent connection accounting.
///
/// The table only grows while connections from an address are live; the last
/// [`Admission`] for an address removes its entry on drop.
#[derive(Clone)]
struct Admissions {
    cap: Option<usize>,
    live: Arc<Mutex<HashMap<IpAddr, usize>>>,
}

impl Admissions {
    fn new(cap: Option<usize>) -> Self {
        Self { cap, live: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Reserves a slot for `ip`, or returns `None` when the address is at
    /// its cap.
    fn admit(&self, ip: IpAddr) -> Option<Admission> {
        let Some(cap) = self.cap else {
            return Some(Admission { ip, live: None });
        };
        let mut live = self.live.lock().expect("admission table poisoned");
        let count = live.entry(ip).or_insert(0);
        if *count >= cap {
            return None;
        }
        *count += 1;
        Some(Admission { ip, live: Some(Arc::clone(&self.live)) })
    }
}

/// One admitted connection's slot. Dropping it releases the slot.
struct Admission {
    ip: IpAddr,
    live: Option<Arc<Mutex<HashMap<IpAddr, usize>>>>,
}

impl Drop for Admission {
    fn drop(&mut self) {
        let Some(live) = &self.live else { return };
        let mut live = match live.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(count) = live.get_mut(&self.ip) {
            *count -= 1;
            if *count == 0 {
                live.remove(&self.ip);
            }
        }
    }
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** (sent by `kubectl` and the
/// Kubernetes control plane) and **SIGINT** (Ctrl-C, for local dev).
/// On Windows only Ctrl-C is available.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    // `pending()` is a future that never resolves — on non-Unix platforms
    // the SIGTERM arm is effectively disabled.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admissions_reject_over_cap_and_release_on_drop() {
        let admissions = Admissions::new(Some(1));
        let ip: IpAddr = "10.0.0.1".parse().unwrap();

        let first = admissions.admit(ip).expect("first connection admitted");
        assert!(admissions.admit(ip).is_none(), "second connection rejected");

        // a different address is unaffected
        let other: IpAddr = "10.0.0.2".parse().unwrap();
        assert!(admissions.admit(other).is_some());

        drop(first);
        assert!(admissions.admit(ip).is_some(), "slot freed after drop");
    }

    #[test]
    fn uncapped_admissions_always_admit() {
        let admissions = Admissions::new(None);
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        let _a = admissions.admit(ip).unwrap();
        let _b = admissions.admit(ip).unwrap();
        assert!(admissions.live.lock().unwrap().is_empty());
    }
}

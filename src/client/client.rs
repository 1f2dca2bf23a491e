//! The facade that binds a [`Pool`] to one authority and implements
//! redirect-following and the body-drain guarantee.

use std::sync::Arc;

use http::{HeaderValue, Method, StatusCode};
use tracing::debug;

use super::conn::{Disposition, SendRequest};
use super::connect;
use super::pool::{AcquireOutcome, Pool, Pooled};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::request::Request;
use crate::response::Response;

/// See `DESIGN.md` for why 10: a cycle must not hang a caller forever.
const MAX_REDIRECTS: usize = 10;

const REDIRECT_STATUSES: [StatusCode; 5] = [
    StatusCode::MOVED_PERMANENTLY,
    StatusCode::FOUND,
    StatusCode::SEE_OTHER,
    StatusCode::TEMPORARY_REDIRECT,
    StatusCode::PERMANENT_REDIRECT,
];

/// A client bound to one authority, backed by a bounded, reusable
/// connection pool.
///
/// Holds a dedicated multi-thread runtime (sized by
/// [`ClientConfig::io_threads`]) that drives every connection's I/O
/// independent of whatever runtime the caller's own code happens to be
/// polled on.
pub struct Client {
    config: ClientConfig,
    pool: Arc<Pool<SendRequest>>,
    io_runtime: Option<tokio::runtime::Runtime>,
}

impl Client {
    pub fn new(config: ClientConfig) -> Client {
        let io_runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.io_threads())
            .thread_name("linkpool-io")
            .enable_all()
            .build()
            .expect("building the client's dedicated I/O runtime");
        let pool = Arc::new(Pool::new(config.max_connections(), config.max_waiters()));
        Client {
            config,
            pool,
            io_runtime: Some(io_runtime),
        }
    }

    fn io_handle(&self) -> tokio::runtime::Handle {
        self.io_runtime
            .as_ref()
            .expect("io runtime lives until Client is dropped")
            .handle()
            .clone()
    }

    /// `acquire` + `send`: dispatches one request without following
    /// redirects, releasing the connection back to the pool once the
    /// response's body finishes (or is abandoned and drained).
    pub async fn apply(&self, request: Request) -> Result<Response> {
        let pooled = self.acquire().await?;
        let id = pooled.id;
        let (response, disposition_rx) = pooled.conn.send(request, &self.io_handle()).await;
        self.handle_disposition(id, disposition_rx);
        response
    }

    /// `apply` with redirect-following: `GET` requests answered with a
    /// `30x` + `Location` are re-sent to the new location, draining each
    /// intermediate response body first. Any other method answered with a
    /// redirect fails with [`Error::is_auto_redirect_not_supported`] (see
    /// [`Error`]).
    pub async fn apply_with_redirects(&self, mut request: Request) -> Result<Response> {
        for _ in 0..MAX_REDIRECTS {
            let is_get = *request.method() == Method::GET;
            let response = self.apply(request).await?;

            if !REDIRECT_STATUSES.contains(&response.status()) {
                return Ok(response);
            }
            let location = match response.headers().get(http::header::LOCATION) {
                Some(location) => location.clone(),
                None => return Ok(response),
            };
            if !is_get {
                return Err(Error::auto_redirect_not_supported());
            }

            let mut body = response.take_body()?;
            body.drain().await;

            request = redirect_request(location)?;
        }
        Err(Error::redirect_loop())
    }

    /// Runs `script` over the response, draining the body afterward
    /// regardless of whether `script` consumed it itself, and re-raising
    /// `script`'s error (if any) only after the drain completes.
    pub async fn run<F, Fut, R>(&self, request: Request, follow_redirects: bool, script: F) -> Result<R>
    where
        F: FnOnce(&Response) -> Fut,
        Fut: std::future::Future<Output = Result<R>>,
    {
        if request.host().is_none() {
            return Err(Error::host_header_missing());
        }

        let response = if follow_redirects {
            self.apply_with_redirects(request).await?
        } else {
            self.apply(request).await?
        };

        let result = script(&response).await;

        // Idempotent: if `script` already took and drained the body, this
        // fails with `StreamAlreadyConsumed`, which is exactly "nothing
        // left to drain" here.
        if let Ok(mut body) = response.take_body() {
            body.drain().await;
        }

        result
    }

    /// Runs `script(self)`, always calling [`Client::stop`] on completion.
    pub async fn run_and_stop<F, Fut, R>(&self, script: F) -> R
    where
        F: FnOnce(&Client) -> Fut,
        Fut: std::future::Future<Output = R>,
    {
        let result = script(self).await;
        self.stop().await;
        result
    }

    /// Closes the pool: fails queued waiters with
    /// [`Error::is_client_already_closed`], closes idle connections, and
    /// leaves `live_count` at zero.
    pub async fn stop(&self) {
        let idle = self.pool.stop().await;
        debug!(count = idle.len(), "closing idle connections");
        // Dropping each `SendRequest` drops its `Transport`, closing the
        // socket.
        drop(idle);
    }

    async fn acquire(&self) -> Result<Pooled<SendRequest>> {
        match self.pool.acquire().await? {
            AcquireOutcome::Ready(pooled) => Ok(pooled),
            AcquireOutcome::MustDial(id) => match connect::dial(&self.config).await {
                Ok(transport) => Ok(self.pool.register(id, SendRequest::new(transport))),
                Err(err) => {
                    self.pool.dial_failed().await;
                    Err(err)
                }
            },
        }
    }

    /// Waits for the connection's eventual disposition (settled by the
    /// body-pump task `send()` spawned) and updates the pool accordingly.
    fn handle_disposition(&self, id: u64, disposition_rx: tokio::sync::oneshot::Receiver<Disposition>) {
        let pool = self.pool.clone();
        self.io_handle().spawn(async move {
            let disposition = match disposition_rx.await {
                Ok(disposition) => disposition,
                // The driving task died without reporting (panic, or the
                // runtime shutting down); the connection can't be trusted.
                Err(_) => Disposition::Closed,
            };
            match disposition {
                Disposition::Reusable(conn, released) => {
                    // Idempotent either way: an explicit `release()` send or
                    // the sender simply being dropped both unblock this.
                    let _ = released.await;
                    pool.release(Pooled { id, conn }).await;
                }
                Disposition::Upgraded | Disposition::Closed => {
                    pool.destroy(id).await;
                }
            }
        });
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        // `Runtime::drop` blocks the current thread until its tasks finish,
        // which panics if called from inside another runtime's worker
        // thread (the common case, since `Client` is usually dropped from
        // async code). `shutdown_background` tears down without blocking.
        if let Some(rt) = self.io_runtime.take() {
            rt.shutdown_background();
        }
    }
}

fn redirect_request(location: HeaderValue) -> Result<Request> {
    let path = location.to_str().map_err(Error::parse)?;
    Request::get(path.to_owned()).build()
}

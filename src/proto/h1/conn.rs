//! Ties the codec pieces (`io`, `decode`, `encode`, `role`) together into
//! the per-connection request/response state machine.
//!
//! A pooled connection serves one request at a time (no pipelining), so
//! the whole life of one exchange — write head, stream body out, read
//! head, stream body in (or hand off on `101`) — is one linear `async fn`
//! rather than a polled state machine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use http::{HeaderMap, Method, StatusCode, Uri};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::oneshot;

use super::io::Buffered;
use super::role;
use crate::body::{self, Body, BodyCell};
use crate::error::{Error, Result};
use crate::upgrade::Upgraded;

/// One live HTTP/1.1 connection, not yet bound to any particular request.
pub(crate) struct Conn<T> {
    io: Buffered<T>,
    /// Cross-checks that only one exchange ever drives this connection at
    /// once. The pool's bookkeeping already guarantees this structurally
    /// (a connection is removed from `available` for the duration of an
    /// exchange); this catches the case where that guarantee is violated
    /// by a bug rather than relying on it silently.
    concurrent_uses: Arc<AtomicUsize>,
}

/// RAII guard backing `Conn`'s concurrent-use check: increments on entry,
/// decrements on drop, regardless of which return path is taken.
struct ConcurrentGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> ConcurrentGuard<'a> {
    /// Returns `None` if another exchange is already in flight.
    fn enter(counter: &'a AtomicUsize) -> Option<ConcurrentGuard<'a>> {
        let prior = counter.fetch_add(1, Ordering::SeqCst);
        debug_assert_eq!(prior, 0, "connection driven by more than one exchange at once");
        if prior != 0 {
            counter.fetch_sub(1, Ordering::SeqCst);
            return None;
        }
        Some(ConcurrentGuard { counter })
    }
}

impl<'a> Drop for ConcurrentGuard<'a> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// What a request produced: a head plus however its body is reachable.
pub(crate) struct ReceivedResponse {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: ResponseBody,
}

pub(crate) enum ResponseBody {
    Cell(BodyCell),
    Upgrade(Upgraded),
}

/// What became of the connection after one request/response exchange.
pub(crate) enum Outcome<T> {
    /// The body (if any) was fully read from the wire; the connection may
    /// be handed back to the pool once `release` resolves.
    Reusable(Conn<T>, oneshot::Receiver<()>),
    /// A `101` response handed the transport to the caller; the connection
    /// itself no longer exists as an HTTP/1.1 conversation.
    Upgraded,
    /// A write or parse error, or a non-`close`-respecting peer, makes the
    /// transport unsafe to reuse.
    Closed,
}

impl<T> Conn<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub(crate) fn new(io: T) -> Conn<T> {
        Conn {
            io: Buffered::new(io),
            concurrent_uses: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Probes an otherwise-idle connection for liveness without blocking.
    ///
    /// A zero-duration read attempt: if it doesn't resolve immediately,
    /// there is nothing pending and the peer hasn't closed, so the
    /// connection is still open. An immediate `Ok(0)` means the peer sent
    /// EOF; anything else (unsolicited data, or an error) makes this
    /// connection unsafe to hand back out.
    pub(crate) async fn is_open(&mut self) -> bool {
        if !self.io.read_buf().is_empty() {
            return false;
        }
        match tokio::time::timeout(std::time::Duration::from_millis(0), self.io.try_read_for_liveness()).await {
            Err(_) => true,
            Ok(Ok(0)) => false,
            Ok(Ok(_)) => false,
            Ok(Err(_)) => false,
        }
    }

    /// Writes a request head and streams `body_rx` out, reads the response
    /// head, reports it through `response_tx`, then streams the response
    /// body into a fresh queue that the reported [`ResponseBody::Cell`]
    /// reads from.
    ///
    /// Returns once the exchange is fully resolved one way or another: the
    /// connection is reusable, was upgraded away, or must be closed.
    pub(crate) async fn roundtrip(
        mut self,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        has_body: bool,
        mut body: Body,
        response_tx: oneshot::Sender<Result<ReceivedResponse>>,
    ) -> Outcome<T> {
        let _guard = match ConcurrentGuard::enter(&self.concurrent_uses) {
            Some(guard) => guard,
            None => {
                let _ = response_tx.send(Err(Error::panic(
                    "connection driven by more than one exchange at once",
                )));
                return Outcome::Closed;
            }
        };

        if let Err(err) = self.write_request(&method, &uri, &headers, has_body, &mut body).await {
            let _ = response_tx.send(Err(err));
            return Outcome::Closed;
        }

        let head = match self.read_head().await {
            Ok(head) => head,
            Err(err) => {
                let _ = response_tx.send(Err(err));
                return Outcome::Closed;
            }
        };

        if head.status == StatusCode::SWITCHING_PROTOCOLS {
            let leftover = self.io.take_leftover();
            let upgraded = Upgraded::new(self.io.into_inner(), leftover);
            let _ = response_tx.send(Ok(ReceivedResponse {
                status: head.status,
                headers: head.headers,
                body: ResponseBody::Upgrade(upgraded),
            }));
            return Outcome::Upgraded;
        }

        let decoder = match role::response_decoder(head.status, &head.headers, &method) {
            Ok(decoder) => decoder,
            Err(err) => {
                let _ = response_tx.send(Err(err));
                return Outcome::Closed;
            }
        };

        let (body_tx, body_rx_in) = body::channel();
        let (release_tx, release_rx) = oneshot::channel();
        let cell = BodyCell::new(body_rx_in, release_tx);

        if response_tx
            .send(Ok(ReceivedResponse {
                status: head.status,
                headers: head.headers,
                body: ResponseBody::Cell(cell),
            }))
            .is_err()
        {
            // Caller went away (e.g. the request future was dropped); still
            // have to read the body off the wire before this connection can
            // be trusted again, so fall through and drain it.
        }

        match self.stream_response_body(decoder, body_tx).await {
            Ok(()) => Outcome::Reusable(self, release_rx),
            Err(()) => Outcome::Closed,
        }
    }

    async fn write_request(
        &mut self,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        has_body: bool,
        body: &mut Body,
    ) -> Result<()> {
        let encoder = role::encode_request_head(method, uri, headers, has_body, self.io.write_buf_mut());

        if !has_body {
            return self.io.write_chunk(&[]).await;
        }

        while let Some(chunk) = body.next_chunk().await {
            let chunk = chunk?;
            let framed = encoder.encode(chunk);
            self.io.write_chunk(&framed).await?;
        }
        if let Some(end) = encoder.end() {
            self.io.write_chunk(&end).await?;
        } else {
            self.io.write_chunk(&[]).await?;
        }
        Ok(())
    }

    async fn read_head(&mut self) -> Result<role::ParsedHead> {
        loop {
            if let Some(head) = role::parse_response(self.io.read_buf())? {
                self.io.consume(head.consumed);
                return Ok(head);
            }
            let n = self.io.fill_buf().await.map_err(Error::write)?;
            if n == 0 {
                return Err(Error::connection_closed());
            }
        }
    }

    /// Streams the response body off the wire into `body_tx`.
    ///
    /// If the reader has dropped its end (`body_tx.send` fails), keeps
    /// reading and discarding so the transport stays framed correctly,
    /// rather than leaving unread bytes behind for the next request.
    async fn stream_response_body(
        &mut self,
        mut decoder: super::decode::Decoder,
        body_tx: body::BodySender,
    ) -> std::result::Result<(), ()> {
        let mut detached = false;
        loop {
            if decoder.is_eof() {
                if !detached {
                    body_tx.end().await;
                }
                return Ok(());
            }
            match decoder.decode_next(&mut self.io).await {
                Ok(chunk) if chunk.is_empty() => continue,
                Ok(chunk) => {
                    if !detached && body_tx.send(chunk).await.is_err() {
                        detached = true;
                    }
                }
                Err(err) => {
                    if !detached {
                        body_tx.send_error(err).await;
                    }
                    return Err(());
                }
            }
        }
    }
}

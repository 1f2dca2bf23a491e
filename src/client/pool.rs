//! Client connection pooling: a bounded set of persistent connections to
//! one authority, plus a bounded FIFO of acquirers waiting for one.
//!
//! An `available`/`waiters` pair driven by a `tokio::sync::Mutex` and
//! `oneshot` handoffs: since this pool only ever binds to one authority,
//! there is no per-authority key, just one idle list and one waiter queue.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{oneshot, Mutex};

use crate::error::{Error, Result};

/// Connections report whether they're still usable before being handed
/// back out of the idle list, so a server-side idle close surfaces as a
/// fresh dial attempt on the next acquirer rather than a spurious error.
pub(crate) trait Liveness {
    async fn is_open(&mut self) -> bool;
}

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// A process-wide monotonic connection id, for diagnostics only.
pub(crate) fn next_connection_id() -> u64 {
    NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed)
}

/// A pooled connection handle. `id` and `open` are read by the pool; the
/// payload `T` is whatever the caller stores alongside (here, a
/// [`super::conn::SendRequest`]).
pub(crate) struct Pooled<T> {
    pub(crate) id: u64,
    pub(crate) conn: T,
}

struct Inner<T> {
    available: VecDeque<Pooled<T>>,
    waiters: VecDeque<oneshot::Sender<Result<Pooled<T>>>>,
    live_count: usize,
    closed: bool,
}

/// A bounded pool of connections to a single authority.
///
/// `T` is the connection payload type; the pool itself only tracks identity
/// and liveness bookkeeping, leaving dialing and the actual request/response
/// exchange to the caller (`client::conn`/`client::client`).
pub(crate) struct Pool<T> {
    inner: Arc<Mutex<Inner<T>>>,
    max_connections: usize,
    max_waiters: usize,
}

/// What `acquire` tells the caller to do.
pub(crate) enum Acquired<T> {
    /// An idle connection was handed back directly.
    Reused(Pooled<T>),
    /// The pool has room for a new connection; the caller must dial one and
    /// call [`Pool::register`] (on success) or [`Pool::dial_failed`] (on
    /// failure) to balance the `live_count` bump this variant already made.
    Dial(u64),
}

impl<T> Pool<T> {
    pub(crate) fn new(max_connections: usize, max_waiters: usize) -> Pool<T> {
        Pool {
            inner: Arc::new(Mutex::new(Inner {
                available: VecDeque::new(),
                waiters: VecDeque::new(),
                live_count: 0,
                closed: false,
            })),
            max_connections,
            max_waiters,
        }
    }

    /// Step 1–4 of the pool's `acquire`: try an idle connection (skipping
    /// over any that the peer has since closed), then try to make room to
    /// dial, then queue as a waiter.
    pub(crate) async fn acquire(&self) -> Result<AcquireOutcome<T>>
    where
        T: Liveness,
    {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Err(Error::client_already_closed());
        }
        while let Some(mut pooled) = inner.available.pop_front() {
            if pooled.conn.is_open().await {
                return Ok(AcquireOutcome::Ready(pooled));
            }
            inner.live_count = inner.live_count.saturating_sub(1);
        }
        if inner.live_count < self.max_connections {
            inner.live_count += 1;
            let id = next_connection_id();
            return Ok(AcquireOutcome::MustDial(id));
        }
        if inner.waiters.len() >= self.max_waiters {
            return Err(Error::too_many_waiters());
        }
        let (tx, rx) = oneshot::channel();
        inner.waiters.push_back(tx);
        drop(inner);
        rx.await.map_err(|_| Error::client_already_closed())?
    }

    /// Completes a successful dial begun by `MustDial`, wrapping the new
    /// connection as live (`live_count` was already bumped by `acquire`; it
    /// is not placed in `available` since the caller that dialed it is
    /// about to use it immediately).
    pub(crate) fn register(&self, id: u64, conn: T) -> Pooled<T> {
        Pooled { id, conn }
    }

    /// Balances the `live_count` bump from `MustDial` when the dial itself
    /// failed.
    pub(crate) async fn dial_failed(&self) {
        let mut inner = self.inner.lock().await;
        inner.live_count = inner.live_count.saturating_sub(1);
    }

    /// `release(c)`: hands `c` directly to the head waiter (bypassing
    /// `available`) if one exists, otherwise returns it to `available`.
    pub(crate) async fn release(&self, pooled: Pooled<T>) {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            inner.live_count = inner.live_count.saturating_sub(1);
            return;
        }
        let mut pooled = pooled;
        while let Some(waiter) = inner.waiters.pop_front() {
            // Waiter dropped its receiver (e.g. its acquire was cancelled);
            // try the next one with the same connection.
            match waiter.send(Ok(pooled)) {
                Ok(()) => return,
                Err(Ok(pooled_back)) => pooled = pooled_back,
                Err(Err(_)) => unreachable!("release only ever sends Ok"),
            }
        }
        inner.available.push_back(pooled);
    }

    /// `destroy(c)`: removes `c` from bookkeeping. Idempotent from the
    /// caller's perspective — callers track whether they've already
    /// destroyed a given connection id themselves.
    pub(crate) async fn destroy(&self, id: u64) {
        let mut inner = self.inner.lock().await;
        inner.available.retain(|p| p.id != id);
        inner.live_count = inner.live_count.saturating_sub(1);
    }

    /// `stop()`: closes the pool, fails all waiters, and reports the
    /// connections the caller must now close.
    pub(crate) async fn stop(&self) -> Vec<Pooled<T>> {
        let mut inner = self.inner.lock().await;
        inner.closed = true;
        while let Some(waiter) = inner.waiters.pop_front() {
            let _ = waiter.send(Err(Error::client_already_closed()));
        }
        let drained: Vec<_> = inner.available.drain(..).collect();
        inner.live_count = inner.live_count.saturating_sub(drained.len());
        drained
    }

    pub(crate) async fn live_count(&self) -> usize {
        self.inner.lock().await.live_count
    }
}

pub(crate) enum AcquireOutcome<T> {
    /// A connection is ready to use right away (reused, or handed off by a
    /// `release` while this caller was waiting).
    Ready(Pooled<T>),
    /// The caller must dial a new connection itself and report the outcome
    /// via [`Pool::register`]/[`Pool::dial_failed`].
    MustDial(u64),
}

//! Streaming request/response content.
//!
//! A [`Body`] is a lazy, single-shot byte sequence: it may be read at most
//! once, and its accompanying headers (`Content-Length`,
//! `Transfer-Encoding`, `Content-Type`) travel with it rather than with the
//! surrounding `Request`/`Response`.

use std::fmt;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::HeaderMap;
use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};

/// The channel capacity backing a connection's body queue.
///
/// This is the "bounded/synchronous byte-chunk queue" from the connection
/// state machine: it bounds in-flight chunks and is the mechanism by which
/// a slow body consumer applies backpressure to the transport read loop.
pub(crate) const BODY_QUEUE_DEPTH: usize = 4;

/// A lazy, finite, single-shot byte sequence.
///
/// Polling after the terminal frame has been observed, or after the body
/// was never populated (see [`Body::empty`]), simply yields no further
/// items; attempting to take a *second* independent reader over the same
/// underlying queue (see [`BodyCell`]) is what yields
/// [`Error::is_stream_already_consumed`].
pub struct Body {
    kind: Kind,
    headers: HeaderMap,
    release: Option<oneshot::Sender<()>>,
}

enum Kind {
    Empty,
    Once(Option<Bytes>),
    Incoming(mpsc::Receiver<Result<Bytes>>),
}

impl Body {
    /// The distinguished zero-length body value.
    pub fn empty() -> Body {
        Body {
            kind: Kind::Empty,
            headers: HeaderMap::new(),
            release: None,
        }
    }

    /// Builds a whole-in-memory content value, setting `Content-Length`.
    ///
    /// This is the common case for request bodies: the caller already has
    /// the bytes, so there is nothing to stream. Response bodies, which do
    /// need to stream off the wire without full buffering, are built via
    /// [`Body::incoming`] by the connection driver instead.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Body {
        let bytes = bytes.into();
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_LENGTH,
            http::HeaderValue::from_str(&bytes.len().to_string()).expect("itoa string is valid"),
        );
        Body {
            kind: Kind::Once(Some(bytes)),
            headers,
            release: None,
        }
    }

    pub(crate) fn incoming(
        rx: mpsc::Receiver<Result<Bytes>>,
        headers: HeaderMap,
        release: oneshot::Sender<()>,
    ) -> Body {
        Body {
            kind: Kind::Incoming(rx),
            headers,
            release: Some(release),
        }
    }

    /// The headers that describe this content (`Content-Length`,
    /// `Transfer-Encoding`, `Content-Type`, and similar).
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Whether this is the distinguished empty body, as opposed to one that
    /// may yet produce chunks (even zero of them, for `Kind::Incoming`).
    pub(crate) fn is_definitely_empty(&self) -> bool {
        matches!(self.kind, Kind::Empty)
    }

    /// Reads the next chunk, or `None` once the body is exhausted.
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes>> {
        match &mut self.kind {
            Kind::Empty => None,
            Kind::Once(slot) => slot.take().map(Ok),
            Kind::Incoming(rx) => loop {
                match rx.recv().await {
                    None => {
                        self.finish();
                        return None;
                    }
                    Some(Ok(bytes)) if bytes.is_empty() => {
                        self.finish();
                        return None;
                    }
                    other => return other,
                }
            },
        }
    }

    /// Reads the entire body into memory.
    ///
    /// A response body fully consumed this way yields exactly the bytes
    /// the server sent, in order, with no duplication or loss.
    pub async fn to_bytes(mut self) -> Result<Bytes> {
        let mut buf = Vec::new();
        while let Some(chunk) = self.next_chunk().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(Bytes::from(buf))
    }

    /// Drains and discards all remaining chunks.
    ///
    /// This is what `Client::run` calls before resolving, guaranteeing the
    /// connection is eligible for reuse regardless of whether the caller's
    /// script consumed the body itself.
    pub async fn drain(&mut self) {
        while self.next_chunk().await.is_some() {}
    }

    fn finish(&mut self) {
        if let Some(release) = self.release.take() {
            // A `Sender` can only be consumed once; idempotent by construction.
            let _ = release.send(());
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body").finish()
    }
}

/// A take-once cell guarding the single reader of a connection's body
/// queue.
///
/// This is the "single-reader gate" (`readers`) from the connection state
/// machine: for an ordinary response it backs [`Body`]; for a `101`
/// response it backs the upgrade's downstream byte sequence instead. Only
/// one of the two may ever be taken, matching the source's single binary
/// semaphore shared between both call sites.
#[derive(Clone)]
pub(crate) struct BodyCell {
    inner: Arc<Mutex<Option<Taken>>>,
}

struct Taken {
    rx: mpsc::Receiver<Result<Bytes>>,
    release: oneshot::Sender<()>,
}

impl BodyCell {
    pub(crate) fn new(rx: mpsc::Receiver<Result<Bytes>>, release: oneshot::Sender<()>) -> BodyCell {
        BodyCell {
            inner: Arc::new(Mutex::new(Some(Taken { rx, release }))),
        }
    }

    /// Takes the body as an ordinary [`Body`], wired with `headers`.
    pub(crate) fn take_body(&self, headers: HeaderMap) -> Result<Body> {
        let taken = self
            .inner
            .lock()
            .expect("BodyCell mutex poisoned")
            .take()
            .ok_or_else(Error::stream_already_consumed)?;
        Ok(Body::incoming(taken.rx, headers, taken.release))
    }

    /// Takes the underlying raw channel for an upgrade handoff.
    pub(crate) fn take_raw(&self) -> Result<(mpsc::Receiver<Result<Bytes>>, oneshot::Sender<()>)> {
        let taken = self
            .inner
            .lock()
            .expect("BodyCell mutex poisoned")
            .take()
            .ok_or_else(Error::stream_already_consumed)?;
        Ok((taken.rx, taken.release))
    }
}

/// The producing half of a connection's body queue, held by the connection
/// driver while it pumps inbound chunks.
pub(crate) struct BodySender {
    tx: mpsc::Sender<Result<Bytes>>,
}

impl BodySender {
    pub(crate) fn new(tx: mpsc::Sender<Result<Bytes>>) -> BodySender {
        BodySender { tx }
    }

    /// Enqueues a content chunk. Fails (without blocking forever) once the
    /// reader has been dropped, which is the connection driver's signal to
    /// switch into drain-mode (read-and-discard from the transport without
    /// trying to enqueue) rather than stalling on a dead channel.
    pub(crate) async fn send(&self, chunk: Bytes) -> std::result::Result<(), ()> {
        self.tx.send(Ok(chunk)).await.map_err(|_| ())
    }

    pub(crate) async fn send_error(&self, err: Error) {
        let _ = self.tx.send(Err(err)).await;
    }

    /// Enqueues the terminal empty chunk.
    pub(crate) async fn end(&self) {
        let _ = self.tx.send(Ok(Bytes::new())).await;
    }
}

pub(crate) fn channel() -> (BodySender, mpsc::Receiver<Result<Bytes>>) {
    let (tx, rx) = mpsc::channel(BODY_QUEUE_DEPTH);
    (BodySender::new(tx), rx)
}

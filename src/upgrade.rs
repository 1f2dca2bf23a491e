//! HTTP Upgrades
//!
//! When a response arrives with status `101 Switching Protocols`, the byte
//! stream following the blank line that terminates it is no longer HTTP.
//! [`Upgraded`] is the raw, type-erased transport handed back to the
//! caller so it can speak whatever protocol was negotiated (WebSocket,
//! HTTP/2 prior knowledge, ...), preserving any bytes the codec had already
//! buffered past the terminator.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// An upgraded connection's raw transport.
///
/// Implements [`AsyncRead`] and [`AsyncWrite`] directly; this is the
/// idiomatic-Rust shape for "hand back the raw post-upgrade byte stream"
/// (see `DESIGN.md`): instead of a function taking an inbound byte stream
/// and returning an outbound one, callers read and write this value
/// directly.
pub struct Upgraded {
    io: Box<dyn IoTransport>,
    read_buf: Bytes,
}

trait IoTransport: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> IoTransport for T {}

impl Upgraded {
    pub(crate) fn new<T>(io: T, read_buf: Bytes) -> Upgraded
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        Upgraded {
            io: Box::new(io),
            read_buf,
        }
    }
}

impl fmt::Debug for Upgraded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upgraded").finish()
    }
}

impl AsyncRead for Upgraded {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        if !self.read_buf.is_empty() {
            let n = std::cmp::min(buf.remaining(), self.read_buf.len());
            let chunk = self.read_buf.split_to(n);
            buf.put_slice(&chunk);
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut self.io).poll_read(cx, buf)
    }
}

impl AsyncWrite for Upgraded {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.io).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.io).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.io).poll_shutdown(cx)
    }
}

/// Takes the leftover bytes the codec had already read past the
/// terminator of a `101` response head, so an [`Upgraded`] built from them
/// doesn't lose them.
pub(crate) fn take_leftover(buf: &mut BytesMut) -> Bytes {
    buf.split().freeze()
}

//! Buffered reads/writes over the transport.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

/// Default read chunk size, roughly two TCP segments; large enough to
/// amortize syscalls without holding excess memory per idle connection.
const READ_CHUNK: usize = 8 * 1024;

/// Wraps a transport with a read buffer (so head parsing can see bytes
/// already read past the part it has consumed so far) and a write buffer
/// (so a request head and its first body chunk can be coalesced into one
/// write when convenient).
pub(crate) struct Buffered<T> {
    io: T,
    read_buf: BytesMut,
    write_buf: Vec<u8>,
}

impl<T> Buffered<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(io: T) -> Buffered<T> {
        Buffered {
            io,
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            write_buf: Vec::with_capacity(256),
        }
    }

    pub(crate) fn write_buf_mut(&mut self) -> &mut Vec<u8> {
        &mut self.write_buf
    }

    /// Flushes the write buffer and a body chunk to the transport.
    ///
    /// A write error here closes the transport and fails the pending
    /// response with `Error::is_write`.
    pub(crate) async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        if !self.write_buf.is_empty() {
            self.io
                .write_all(&self.write_buf)
                .await
                .map_err(Error::write)?;
            self.write_buf.clear();
        }
        if !chunk.is_empty() {
            self.io.write_all(chunk).await.map_err(Error::write)?;
        }
        self.io.flush().await.map_err(Error::write)?;
        Ok(())
    }

    /// Reads more bytes from the transport into the read buffer.
    ///
    /// Returns the number of bytes read; `0` means the transport hit EOF.
    /// Demand-driven: this is only ever called when the caller actually
    /// wants more data, never speculatively.
    pub(crate) async fn fill_buf(&mut self) -> std::io::Result<usize> {
        let mut scratch = [0u8; READ_CHUNK];
        let n = self.io.read(&mut scratch).await?;
        if n > 0 {
            self.read_buf.extend_from_slice(&scratch[..n]);
        }
        Ok(n)
    }

    pub(crate) fn read_buf(&self) -> &[u8] {
        &self.read_buf
    }

    pub(crate) fn consume(&mut self, amt: usize) {
        let _ = self.read_buf.split_to(amt);
    }

    /// Takes whatever is left in the read buffer, for the upgrade handoff:
    /// bytes the codec already read past the `101` head terminator must
    /// not be lost.
    pub(crate) fn take_leftover(&mut self) -> Bytes {
        self.read_buf.split().freeze()
    }

    pub(crate) fn into_inner(self) -> T {
        self.io
    }

    /// Attempts to read one byte directly from the transport, bypassing
    /// the read buffer.
    ///
    /// Used only to probe an idle connection for liveness; a completed
    /// read here means either EOF (`Ok(0)`) or unexpected data, and
    /// either way the connection is no longer a stale-free idle
    /// candidate. Only call this when `read_buf()` is empty.
    pub(crate) async fn try_read_for_liveness(&mut self) -> std::io::Result<usize> {
        let mut scratch = [0u8; 1];
        self.io.read(&mut scratch).await
    }
}

//! Body decoders for the different ways an HTTP/1.1 message can delimit
//! its length.
//!
//! A small state machine per transfer-coding, expressed as plain `async
//! fn`s rather than hand-rolled `Future::poll` impls, since this crate
//! drives I/O with `async`/`await` throughout.

use bytes::Bytes;

use super::io::Buffered;
use crate::error::{Error, Result};

/// Maximum chunk-size line length, guarding against a peer that never
/// sends a CRLF.
const MAX_CHUNK_HEADER_LEN: usize = 4096;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Decoder {
    /// `Content-Length: N`. Reads until exactly `N` bytes are seen.
    Length(u64),
    /// `Transfer-Encoding: chunked`.
    Chunked(ChunkedState),
    /// Neither header present on a response: read until the peer closes
    /// the transport.
    Eof { seen_eof: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ChunkedState {
    ReadingSize,
    ReadingBody { remaining: u64 },
    ReadingTrailerCrLf,
    Done,
}

impl Decoder {
    pub(crate) fn length(n: u64) -> Decoder {
        Decoder::Length(n)
    }

    pub(crate) fn chunked() -> Decoder {
        Decoder::Chunked(ChunkedState::ReadingSize)
    }

    pub(crate) fn eof() -> Decoder {
        Decoder::Eof { seen_eof: false }
    }

    pub(crate) fn is_eof(&self) -> bool {
        matches!(
            self,
            Decoder::Length(0) | Decoder::Chunked(ChunkedState::Done) | Decoder::Eof { seen_eof: true }
        )
    }

    /// Reads and returns the next content chunk, or an empty `Bytes` once
    /// the body has reached its terminal marker.
    pub(crate) async fn decode_next<T>(&mut self, io: &mut Buffered<T>) -> Result<Bytes>
    where
        T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
    {
        match self {
            Decoder::Length(remaining) => {
                if *remaining == 0 {
                    return Ok(Bytes::new());
                }
                let chunk = read_some(io).await?;
                if chunk.is_empty() {
                    return Err(Error::connection_closed());
                }
                let take = std::cmp::min(chunk.len() as u64, *remaining) as usize;
                *remaining -= take as u64;
                Ok(chunk.slice(0..take))
            }
            Decoder::Eof { seen_eof } => {
                if *seen_eof {
                    return Ok(Bytes::new());
                }
                let chunk = read_some(io).await?;
                if chunk.is_empty() {
                    *seen_eof = true;
                }
                Ok(chunk)
            }
            Decoder::Chunked(state) => decode_chunked(state, io).await,
        }
    }
}

/// Reads whatever is already buffered, filling the buffer first if empty.
async fn read_some<T>(io: &mut Buffered<T>) -> Result<Bytes>
where
    T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    if io.read_buf().is_empty() {
        io.fill_buf().await.map_err(Error::write)?;
    }
    let n = io.read_buf().len();
    let chunk = Bytes::copy_from_slice(io.read_buf());
    io.consume(n);
    Ok(chunk)
}

async fn decode_chunked<T>(state: &mut ChunkedState, io: &mut Buffered<T>) -> Result<Bytes>
where
    T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    loop {
        match state {
            ChunkedState::Done => return Ok(Bytes::new()),
            ChunkedState::ReadingSize => {
                let line = match read_line(io, MAX_CHUNK_HEADER_LEN).await? {
                    Some(line) => line,
                    None => return Err(Error::connection_closed()),
                };
                let size_str = line.split(|&b| b == b';').next().unwrap_or(&line);
                let size_str =
                    std::str::from_utf8(size_str).map_err(|e| Error::parse(e))?;
                let size = u64::from_str_radix(size_str.trim(), 16)
                    .map_err(|e| Error::parse(e))?;
                *state = if size == 0 {
                    ChunkedState::ReadingTrailerCrLf
                } else {
                    ChunkedState::ReadingBody { remaining: size }
                };
            }
            ChunkedState::ReadingBody { remaining } => {
                if *remaining == 0 {
                    // Consume the CRLF that follows each chunk's data.
                    let _ = read_line(io, 2).await?;
                    *state = ChunkedState::ReadingSize;
                    continue;
                }
                let chunk = read_some(io).await?;
                if chunk.is_empty() {
                    return Err(Error::connection_closed());
                }
                let take = std::cmp::min(chunk.len() as u64, *remaining) as usize;
                *remaining -= take as u64;
                return Ok(chunk.slice(0..take));
            }
            ChunkedState::ReadingTrailerCrLf => {
                // Consume trailers (if any) up to the final blank line.
                loop {
                    let line = match read_line(io, MAX_CHUNK_HEADER_LEN).await? {
                        Some(line) => line,
                        None => return Err(Error::connection_closed()),
                    };
                    if line.is_empty() {
                        break;
                    }
                }
                *state = ChunkedState::Done;
                return Ok(Bytes::new());
            }
        }
    }
}

/// Reads a single CRLF-terminated line (without the CRLF), growing the
/// read buffer as needed, bounded by `max_len`.
async fn read_line<T>(io: &mut Buffered<T>, max_len: usize) -> Result<Option<BytesLine>>
where
    T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    loop {
        if let Some(pos) = find_crlf(io.read_buf()) {
            if pos > max_len {
                return Err(Error::parse("chunk header line too long"));
            }
            let line = io.read_buf()[..pos].to_vec();
            io.consume(pos + 2);
            return Ok(Some(line));
        }
        if io.read_buf().len() > max_len {
            return Err(Error::parse("chunk header line too long"));
        }
        let n = io.fill_buf().await.map_err(Error::write)?;
        if n == 0 {
            return Ok(None);
        }
    }
}

type BytesLine = Vec<u8>;

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

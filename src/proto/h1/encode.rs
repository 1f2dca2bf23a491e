//! Body encoders for the outbound request.
//!
//! Only the two kinds a client ever needs to produce:
//! `Content-Length`-delimited and `chunked`. Close-delimited encoding is a
//! server-side-only concern and has no counterpart here.

use bytes::{BufMut, Bytes, BytesMut};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Encoder {
    Length(u64),
    Chunked,
}

impl Encoder {
    /// Frames one outbound chunk for the wire.
    pub(crate) fn encode(&self, chunk: Bytes) -> Bytes {
        match self {
            Encoder::Length(_) => chunk,
            Encoder::Chunked => {
                let mut framed = BytesMut::with_capacity(chunk.len() + 16);
                framed.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
                framed.put_slice(&chunk);
                framed.extend_from_slice(b"\r\n");
                framed.freeze()
            }
        }
    }

    /// The terminal marker for this encoding, if any.
    pub(crate) fn end(&self) -> Option<Bytes> {
        match self {
            Encoder::Length(_) => None,
            Encoder::Chunked => Some(Bytes::from_static(b"0\r\n\r\n")),
        }
    }
}

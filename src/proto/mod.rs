//! The HTTP/1.1 wire protocol: head parsing/encoding and body framing.

pub(crate) mod h1;

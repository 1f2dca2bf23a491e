//! Request-head encoding and response-head parsing.
//!
//! Client-only: this crate never plays the server role, so only response
//! parsing and request rendering exist here. Parses with `httparse`
//! directly against the `http` crate's header/status types.

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderMap, Method, StatusCode, Uri};

use super::decode::Decoder;
use super::encode::Encoder;
use crate::error::{Error, Result};

const MAX_HEADERS: usize = 100;

/// A parsed response head: status line plus headers, and the byte length of
/// the head within the buffer it was parsed from (so the caller can consume
/// exactly that many bytes and keep whatever follows).
pub(crate) struct ParsedHead {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) consumed: usize,
}

/// Parses a response head out of `buf`. Returns `Ok(None)` if the head is
/// not yet complete (more bytes needed).
pub(crate) fn parse_response(buf: &[u8]) -> Result<Option<ParsedHead>> {
    let mut raw_headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut res = httparse::Response::new(&mut raw_headers);
    let consumed = match res.parse(buf).map_err(Error::parse)? {
        httparse::Status::Partial => return Ok(None),
        httparse::Status::Complete(n) => n,
    };

    let code = res.code.expect("httparse gives a code on Complete");
    let status = StatusCode::from_u16(code).map_err(Error::parse)?;

    let mut headers = HeaderMap::with_capacity(res.headers.len());
    for raw in res.headers.iter() {
        let name = HeaderName::from_bytes(raw.name.as_bytes()).map_err(Error::parse)?;
        let value = HeaderValue::from_bytes(raw.value).map_err(Error::parse)?;
        headers.append(name, value);
    }

    Ok(Some(ParsedHead {
        status,
        headers,
        consumed,
    }))
}

/// Chooses the body decoder for a response, given the request method that
/// produced it, per RFC 7230 §3.3.3: 1xx/204/304/HEAD/2xx-to-CONNECT never
/// have a body; `Transfer-Encoding: chunked` wins over `Content-Length`;
/// absent both, the body runs to EOF.
pub(crate) fn response_decoder(
    status: StatusCode,
    headers: &HeaderMap,
    request_method: &Method,
) -> Result<Decoder> {
    if status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED {
        return Ok(Decoder::length(0));
    }
    if *request_method == Method::HEAD {
        return Ok(Decoder::length(0));
    }
    if *request_method == Method::CONNECT && status.is_success() {
        return Ok(Decoder::length(0));
    }

    if let Some(te) = headers.get(TRANSFER_ENCODING) {
        let te = te.to_str().map_err(Error::parse)?;
        if te.rsplit(',').next().map(|c| c.trim().eq_ignore_ascii_case("chunked")) == Some(true) {
            return Ok(Decoder::chunked());
        }
        return Ok(Decoder::eof());
    }

    if let Some(len) = headers.get(CONTENT_LENGTH) {
        let len = len
            .to_str()
            .map_err(Error::parse)?
            .parse::<u64>()
            .map_err(Error::parse)?;
        return Ok(Decoder::length(len));
    }

    Ok(Decoder::eof())
}

/// Renders a request head (request line + headers + terminating blank
/// line) into `dst`, returning the [`Encoder`] the caller should use for
/// the body that follows.
///
/// `headers` is expected to already carry the merged content/request
/// headers (see `client::conn::merge_headers`); this function only
/// decides `Content-Length` vs. `chunked` vs. no body and writes bytes,
/// it does not merge.
pub(crate) fn encode_request_head(
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    has_body: bool,
    dst: &mut Vec<u8>,
) -> Encoder {
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    dst.extend_from_slice(method.as_str().as_bytes());
    dst.extend_from_slice(b" ");
    dst.extend_from_slice(path.as_bytes());
    dst.extend_from_slice(b" HTTP/1.1\r\n");

    for (name, value) in headers.iter() {
        dst.extend_from_slice(name.as_str().as_bytes());
        dst.extend_from_slice(b": ");
        dst.extend_from_slice(value.as_bytes());
        dst.extend_from_slice(b"\r\n");
    }

    let can_chunk = *method != Method::HEAD && *method != Method::GET && *method != Method::CONNECT;
    let encoder = request_encoder(headers, has_body, can_chunk, dst);
    dst.extend_from_slice(b"\r\n");
    encoder
}

fn request_encoder(headers: &HeaderMap, has_body: bool, can_chunk: bool, dst: &mut Vec<u8>) -> Encoder {
    if !has_body {
        return Encoder::length(0);
    }
    if let Some(len) = headers.get(CONTENT_LENGTH) {
        if let Ok(len) = len.to_str().unwrap_or("").parse::<u64>() {
            return Encoder::length(len);
        }
    }
    if can_chunk {
        dst.extend_from_slice(b"transfer-encoding: chunked\r\n");
        return Encoder::chunked();
    }
    Encoder::length(0)
}

/// Splits off the leftover bytes following a parsed head, for callers that
/// already hold the whole buffer a head was parsed from.
pub(crate) fn split_leftover(buf: &mut Bytes, consumed: usize) -> Bytes {
    buf.split_off(consumed.min(buf.len()))
}

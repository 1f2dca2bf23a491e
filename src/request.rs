//! Outbound request value object.

use http::{HeaderMap, HeaderValue, Method, Uri};

use crate::body::Body;
use crate::error::Result;

/// A request to be sent to the authority a [`Client`](crate::client::Client)
/// is bound to.
///
/// Headers are an ordered multi-map of case-insensitive names to string
/// values (`http::HeaderMap`). The `content` carries both headers-to-merge
/// (e.g. `Content-Type`) and a lazy, once-consumable byte sequence.
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
}

impl Request {
    /// Starts building a request for `method` against `path_and_query`.
    ///
    /// `path_and_query` is the request-target sent on the wire verbatim
    /// (`path[?query]`); it does not include the scheme or authority, which
    /// are supplied by the `Client` the request is sent through.
    pub fn builder(method: Method, path_and_query: impl Into<String>) -> RequestBuilder {
        RequestBuilder {
            method,
            path: path_and_query.into(),
            headers: HeaderMap::new(),
            body: Body::empty(),
        }
    }

    /// Shorthand for `Request::builder(Method::GET, path)`.
    pub fn get(path_and_query: impl Into<String>) -> RequestBuilder {
        Request::builder(Method::GET, path_and_query)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub(crate) fn into_parts(self) -> (Method, Uri, HeaderMap, Body) {
        (self.method, self.uri, self.headers, self.body)
    }

    /// Reports whether a `Connection: close` header (case-insensitive) is
    /// present, so the connection driver knows to close rather than reuse
    /// the transport after this exchange.
    pub(crate) fn wants_close(&self) -> bool {
        header_says_close(&self.headers)
    }

    pub(crate) fn host(&self) -> Option<&HeaderValue> {
        self.headers.get(http::header::HOST)
    }
}

pub(crate) fn header_says_close(headers: &HeaderMap) -> bool {
    headers
        .get(http::header::CONNECTION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("close"))
        .unwrap_or(false)
}

/// Builder for [`Request`].
pub struct RequestBuilder {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Body,
}

impl RequestBuilder {
    pub fn header(mut self, name: http::header::HeaderName, value: impl Into<HeaderValue>) -> Self {
        self.headers.insert(name, value.into());
        self
    }

    pub fn body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    pub fn build(self) -> Result<Request> {
        let uri: Uri = self
            .path
            .parse()
            .map_err(|e: http::uri::InvalidUri| crate::error::Error::parse(e))?;
        Ok(Request {
            method: self.method,
            uri,
            headers: self.headers,
            body: self.body,
        })
    }
}

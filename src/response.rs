//! Inbound response value object.

use std::sync::Mutex;

use http::{HeaderMap, StatusCode};

use crate::body::{Body, BodyCell};
use crate::error::{Error, Result};
use crate::upgrade::Upgraded;

/// A response received from the authority a
/// [`Client`](crate::client::Client) is bound to.
///
/// `upgrade()` is only meaningful when `status() == 101`; calling it on any
/// other status fails with [`Error::is_upgrade_refused`]. For a `101`
/// response, `content`/`take_body` always yields the distinguished
/// [`Body::empty`] value — the real byte stream that follows a `101` head
/// is raw, not HTTP, and is only reachable through `upgrade()`.
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body_cell: Option<BodyCell>,
    upgrade_cell: Option<Mutex<Option<Upgraded>>>,
}

impl Response {
    pub(crate) fn new(status: StatusCode, headers: HeaderMap, body_cell: BodyCell) -> Response {
        Response {
            status,
            headers,
            body_cell: Some(body_cell),
            upgrade_cell: None,
        }
    }

    pub(crate) fn new_upgrade(status: StatusCode, headers: HeaderMap, upgraded: Upgraded) -> Response {
        Response {
            status,
            headers,
            body_cell: None,
            upgrade_cell: Some(Mutex::new(Some(upgraded))),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Takes the one-shot content stream.
    ///
    /// Fails with [`Error::is_stream_already_consumed`] on a second call,
    /// unless this is a `101` response, whose content is always the
    /// distinguished empty value and may be "taken" any number of times.
    pub fn take_body(&self) -> Result<Body> {
        match &self.body_cell {
            Some(cell) => cell.take_body(content_headers(&self.headers)),
            None => Ok(Body::empty()),
        }
    }

    /// Takes the raw transport following a `101 Switching Protocols`
    /// response.
    ///
    /// Fails with [`Error::is_upgrade_refused`] if `status() != 101`, or
    /// with [`Error::is_stream_already_consumed`] on a second call.
    pub fn upgrade(&self) -> Result<Upgraded> {
        if self.status != StatusCode::SWITCHING_PROTOCOLS {
            return Err(Error::upgrade_refused());
        }
        let cell = self
            .upgrade_cell
            .as_ref()
            .expect("101 response always carries an upgrade cell");
        cell.lock()
            .expect("upgrade cell mutex poisoned")
            .take()
            .ok_or_else(Error::stream_already_consumed)
    }
}

fn content_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();
    for name in [
        http::header::CONTENT_LENGTH,
        http::header::TRANSFER_ENCODING,
        http::header::CONTENT_TYPE,
    ] {
        if let Some(value) = headers.get(&name) {
            out.insert(name, value.clone());
        }
    }
    out
}

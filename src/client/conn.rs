//! One established connection's request/response API.
//!
//! `SendRequest::send` drives exactly one exchange and reports how the
//! connection came out of it, so the pool (`client::pool`) can decide
//! whether to reuse, await release, or destroy it.

use http::HeaderMap;

use super::connect::Transport;
use super::pool::Liveness;
use crate::error::Result;
use crate::proto::h1;
use crate::request::Request;
use crate::response::Response;

/// A connection's outcome after one request/response exchange, reported to
/// the caller so it can update the pool.
pub(crate) enum Disposition {
    /// Read the whole body off the wire; once `released` resolves the
    /// connection may be handed to another request.
    Reusable(SendRequest, tokio::sync::oneshot::Receiver<()>),
    /// A `101` response handed the transport to the caller.
    Upgraded,
    Closed,
}

/// The sending half of one connection, holding the transport between
/// exchanges.
pub(crate) struct SendRequest {
    conn: h1::Conn<Transport>,
}

impl SendRequest {
    pub(crate) fn new(io: Transport) -> SendRequest {
        SendRequest {
            conn: h1::Conn::new(io),
        }
    }

    /// Sends one request and returns its response as soon as the head
    /// resolves, handing back the connection's eventual disposition
    /// through a separate receiver.
    ///
    /// Merges headers content-first, request-second: content-provided
    /// headers (`Content-Length`, `Content-Type`, ...) are written first,
    /// then request-attached headers, with any same-named request header
    /// replacing the content header already written.
    ///
    /// The rest of the exchange — streaming the response body into the
    /// `BodyCell` already reachable from the returned `Response`, and
    /// settling the connection's disposition — is driven by a task
    /// spawned onto `io_handle`, independent of whether or when the
    /// caller reads the body. A response whose body needs more enqueues
    /// than the body channel holds at once must not wait on `send()`
    /// itself returning; that's exactly what's being drained downstream.
    pub(crate) async fn send(
        self,
        request: Request,
        io_handle: &tokio::runtime::Handle,
    ) -> (Result<Response>, tokio::sync::oneshot::Receiver<Disposition>) {
        let (method, uri, request_headers, body) = request.into_parts();
        let has_body = !body.is_definitely_empty();
        let merged = merge_headers(body.headers(), &request_headers);

        let (response_tx, response_rx) = tokio::sync::oneshot::channel();
        let (disposition_tx, disposition_rx) = tokio::sync::oneshot::channel();
        let outcome_fut = self
            .conn
            .roundtrip(method, uri, merged, has_body, body, response_tx);

        io_handle.spawn(async move {
            let outcome = outcome_fut.await;
            let _ = disposition_tx.send(into_disposition(outcome));
        });

        let response = match response_rx.await {
            Ok(Ok(received)) => Ok(build_response(received)),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(crate::error::Error::connection_closed()),
        };
        (response, disposition_rx)
    }

    pub(crate) async fn is_open(&mut self) -> bool {
        self.conn.is_open().await
    }
}

impl Liveness for SendRequest {
    async fn is_open(&mut self) -> bool {
        SendRequest::is_open(self).await
    }
}

fn build_response(received: h1::ReceivedResponse) -> Response {
    match received.body {
        h1::ResponseBody::Cell(cell) => Response::new(received.status, received.headers, cell),
        h1::ResponseBody::Upgrade(upgraded) => {
            Response::new_upgrade(received.status, received.headers, upgraded)
        }
    }
}

fn into_disposition(outcome: h1::Outcome<Transport>) -> Disposition {
    match outcome {
        h1::Outcome::Reusable(conn, release) => Disposition::Reusable(SendRequest { conn }, release),
        h1::Outcome::Upgraded => Disposition::Upgraded,
        h1::Outcome::Closed => Disposition::Closed,
    }
}

fn merge_headers(content_headers: &HeaderMap, request_headers: &HeaderMap) -> HeaderMap {
    let mut merged = HeaderMap::with_capacity(content_headers.len() + request_headers.len());
    for (name, value) in content_headers.iter() {
        merged.insert(name.clone(), value.clone());
    }
    for (name, value) in request_headers.iter() {
        merged.insert(name.clone(), value.clone());
    }
    merged
}

//! Error and Result module.

use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Result type returned by most operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;

type Cause = Box<dyn StdError + Send + Sync>;

/// The error type for this crate.
///
/// Construction is crate-private; callers distinguish cases with
/// [`Error::is_connection_closed`] and friends rather than matching on an
/// open enum, so new variants can be added without breaking callers.
pub struct Error {
    inner: Box<ErrorImpl>,
}

struct ErrorImpl {
    kind: Kind,
    cause: Option<Cause>,
}

#[derive(Debug)]
pub(crate) enum Kind {
    /// The transport closed before a response head was received.
    ConnectionClosed,
    /// A one-shot content stream was read a second time.
    StreamAlreadyConsumed,
    /// `Response::upgrade()` was called on a non-101 response.
    UpgradeRefused,
    /// The pool's waiter queue was full.
    TooManyWaiters,
    /// An operation was attempted after `Client::stop()`.
    ClientAlreadyClosed,
    /// Redirect-following was requested for a non-GET request.
    AutoRedirectNotSupported,
    /// `Client::run` was called without a `Host` header present.
    HostHeaderMissing,
    /// A write to the transport failed mid-request.
    Write,
    /// Dialing a new connection failed.
    Connect,
    /// The HTTP/1.1 message could not be parsed.
    Parse,
    /// An internal invariant was violated.
    ///
    /// This indicates a defect in this crate, not a protocol or user error.
    /// See the design notes in the crate root docs for the panic discipline.
    Panic(&'static str),
    /// Following redirects did not terminate within the hop limit.
    RedirectLoop,
}

impl Error {
    pub(crate) fn new(kind: Kind) -> Error {
        Error {
            inner: Box::new(ErrorImpl { kind, cause: None }),
        }
    }

    pub(crate) fn with_cause<C: Into<Cause>>(mut self, cause: C) -> Error {
        self.inner.cause = Some(cause.into());
        self
    }

    pub(crate) fn connection_closed() -> Error {
        Error::new(Kind::ConnectionClosed)
    }

    pub(crate) fn stream_already_consumed() -> Error {
        Error::new(Kind::StreamAlreadyConsumed)
    }

    pub(crate) fn upgrade_refused() -> Error {
        Error::new(Kind::UpgradeRefused)
    }

    pub(crate) fn too_many_waiters() -> Error {
        Error::new(Kind::TooManyWaiters)
    }

    pub(crate) fn client_already_closed() -> Error {
        Error::new(Kind::ClientAlreadyClosed)
    }

    pub(crate) fn auto_redirect_not_supported() -> Error {
        Error::new(Kind::AutoRedirectNotSupported)
    }

    pub(crate) fn host_header_missing() -> Error {
        Error::new(Kind::HostHeaderMissing)
    }

    pub(crate) fn write(cause: io::Error) -> Error {
        Error::new(Kind::Write).with_cause(cause)
    }

    pub(crate) fn connect<C: Into<Cause>>(cause: C) -> Error {
        Error::new(Kind::Connect).with_cause(cause)
    }

    pub(crate) fn parse<C: Into<Cause>>(cause: C) -> Error {
        Error::new(Kind::Parse).with_cause(cause)
    }

    pub(crate) fn panic(msg: &'static str) -> Error {
        Error::new(Kind::Panic(msg))
    }

    pub(crate) fn redirect_loop() -> Error {
        Error::new(Kind::RedirectLoop)
    }

    /// Returns true if the transport closed before a response was received.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self.inner.kind, Kind::ConnectionClosed)
    }

    /// Returns true if a one-shot content stream was read more than once.
    pub fn is_stream_already_consumed(&self) -> bool {
        matches!(self.inner.kind, Kind::StreamAlreadyConsumed)
    }

    /// Returns true if this is an internal invariant violation.
    ///
    /// A correct program driving this crate through documented APIs should
    /// never observe this; it indicates a defect in this crate itself.
    pub fn is_panic(&self) -> bool {
        matches!(self.inner.kind, Kind::Panic(_))
    }

    /// Returns true if the pool rejected the operation because it is closed.
    pub fn is_client_already_closed(&self) -> bool {
        matches!(self.inner.kind, Kind::ClientAlreadyClosed)
    }

    /// Returns true if the pool's waiter queue was full.
    pub fn is_too_many_waiters(&self) -> bool {
        matches!(self.inner.kind, Kind::TooManyWaiters)
    }

    /// Returns true if `Response::upgrade()` was called on a non-101
    /// response.
    pub fn is_upgrade_refused(&self) -> bool {
        matches!(self.inner.kind, Kind::UpgradeRefused)
    }

    /// Returns true if redirect-following was requested for a non-GET
    /// request.
    pub fn is_auto_redirect_not_supported(&self) -> bool {
        matches!(self.inner.kind, Kind::AutoRedirectNotSupported)
    }

    /// Returns true if `Client::run` was called without a `Host` header.
    pub fn is_host_header_missing(&self) -> bool {
        matches!(self.inner.kind, Kind::HostHeaderMissing)
    }

    /// Returns true if a write to the transport failed mid-request.
    pub fn is_write(&self) -> bool {
        matches!(self.inner.kind, Kind::Write)
    }

    /// Returns true if establishing a connection failed.
    pub fn is_connect(&self) -> bool {
        matches!(self.inner.kind, Kind::Connect)
    }

    /// Returns true if an HTTP/1.1 message failed to parse.
    pub fn is_parse(&self) -> bool {
        matches!(self.inner.kind, Kind::Parse)
    }

    /// Returns true if redirect-following exceeded the hop limit.
    pub fn is_redirect_loop(&self) -> bool {
        matches!(self.inner.kind, Kind::RedirectLoop)
    }

    fn description(&self) -> &str {
        match self.inner.kind {
            Kind::ConnectionClosed => "connection closed before response head was received",
            Kind::StreamAlreadyConsumed => "content stream already consumed",
            Kind::UpgradeRefused => "upgrade() called on a non-101 response",
            Kind::TooManyWaiters => "too many pending connection acquirers",
            Kind::ClientAlreadyClosed => "client already closed",
            Kind::AutoRedirectNotSupported => "automatic redirect following only supports GET",
            Kind::HostHeaderMissing => "request has no Host header",
            Kind::Write => "error writing to transport",
            Kind::Connect => "error establishing connection",
            Kind::Parse => "error parsing HTTP message",
            Kind::Panic(msg) => msg,
            Kind::RedirectLoop => "exceeded maximum redirect hops",
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = f.debug_struct("Error");
        builder.field("kind", &self.inner.kind);
        if let Some(ref cause) = self.inner.cause {
            builder.field("cause", cause);
        }
        builder.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())?;
        if let Some(ref cause) = self.inner.cause {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner
            .cause
            .as_ref()
            .map(|c| &**c as &(dyn StdError + 'static))
    }
}

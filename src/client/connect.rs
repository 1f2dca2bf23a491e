//! Dials the authority a [`Client`](super::Client) is bound to: a plain TCP
//! stream, or a TLS session layered on top of one when `scheme == "https"`.
//!
//! TCP options (`tcp_nodelay`, send/recv buffer hints via `socket2`) are
//! applied the same way regardless of scheme; TLS is layered on with
//! `tokio-rustls`, the idiomatic way to plug a TLS session provider in
//! under tokio.

use std::sync::Arc;

use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpStream;
use tokio_rustls::rustls::{self, OwnedTrustAnchor, RootCertStore, ServerName};
use tokio_rustls::{client::TlsStream, TlsConnector};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::upgrade::Upgraded;

/// Either half of a dialed connection: plain TCP, or TCP wrapped in TLS.
///
/// Both halves implement `AsyncRead + AsyncWrite`, so [`proto::h1::Conn`]
/// and [`Upgraded`] are generic over whichever one a given authority needs
/// and never need to know which.
pub(crate) enum Transport {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Transport {
    pub(crate) fn into_upgraded(self, leftover: bytes::Bytes) -> Upgraded {
        match self {
            Transport::Plain(tcp) => Upgraded::new(tcp, leftover),
            Transport::Tls(tls) => Upgraded::new(*tls, leftover),
        }
    }
}

impl tokio::io::AsyncRead for Transport {
    fn poll_read(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(io) => std::pin::Pin::new(io).poll_read(cx, buf),
            Transport::Tls(io) => std::pin::Pin::new(io.as_mut()).poll_read(cx, buf),
        }
    }
}

impl tokio::io::AsyncWrite for Transport {
    fn poll_write(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<std::io::Result<usize>> {
        match self.get_mut() {
            Transport::Plain(io) => std::pin::Pin::new(io).poll_write(cx, buf),
            Transport::Tls(io) => std::pin::Pin::new(io.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(io) => std::pin::Pin::new(io).poll_flush(cx),
            Transport::Tls(io) => std::pin::Pin::new(io.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(io) => std::pin::Pin::new(io).poll_shutdown(cx),
            Transport::Tls(io) => std::pin::Pin::new(io.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Dials the authority described by `config`, applying its TCP options
/// (`tcp_nodelay`, `buffer_size`) and layering TLS when
/// `config.scheme() == "https"`.
pub(crate) async fn dial(config: &ClientConfig) -> Result<Transport> {
    let addr = (config.host(), config.port());
    let tcp = TcpStream::connect(addr).await.map_err(Error::connect)?;
    tcp.set_nodelay(config.tcp_nodelay()).map_err(Error::connect)?;
    if let Some(size) = config.buffer_size() {
        let sock = SockRef::from(&tcp);
        let _ = sock.set_recv_buffer_size(size);
        let _ = sock.set_send_buffer_size(size);
        let _ = sock.set_tcp_keepalive(&TcpKeepalive::new());
    }

    if !config.is_tls() {
        return Ok(Transport::Plain(tcp));
    }

    let connector = TlsConnector::from(tls_client_config());
    let server_name = ServerName::try_from(config.host()).map_err(Error::connect)?;
    let stream = connector
        .connect(server_name, tcp)
        .await
        .map_err(Error::connect)?;
    Ok(Transport::Tls(Box::new(stream)))
}

fn tls_client_config() -> Arc<rustls::ClientConfig> {
    let mut roots = RootCertStore::empty();
    roots.add_server_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.iter().map(|ta| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(
            ta.subject,
            ta.spki,
            ta.name_constraints,
        )
    }));
    Arc::new(
        rustls::ClientConfig::builder()
            .with_safe_defaults()
            .with_root_certificates(roots)
            .with_no_client_auth(),
    )
}

#![cfg(test)]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use linkpool::{Client, ClientConfig, Request};
use tokio::io::AsyncReadExt;

fn read_request_head(stream: &mut std::net::TcpStream) {
    let mut buf = [0u8; 4096];
    loop {
        let n = stream.read(&mut buf).expect("read");
        if n == 0 {
            return;
        }
        if buf[..n].windows(4).any(|w| w == b"\r\n\r\n") {
            return;
        }
    }
}

fn config_for(addr: std::net::SocketAddr) -> ClientConfig {
    ClientConfig::builder(addr.ip().to_string())
        .port(addr.port())
        .max_connections(1)
        .build()
}

/// Scenario 4: a `101` response hands the raw transport to the caller,
/// preserving bytes the codec had already buffered past the head
/// terminator, and leaves the content empty.
#[tokio::test]
async fn upgrade_yields_leftover_then_live_bytes() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        read_request_head(&mut stream);
        // The head and two raw post-upgrade bytes arrive in the same
        // write, so the codec's read buffer has already captured them by
        // the time the `101` head is parsed.
        stream
            .write_all(
                b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n\xDE\xAD",
            )
            .expect("write head + leftover");
        thread::sleep(Duration::from_millis(30));
        stream.write_all(b"\xBE\xEF").expect("write live bytes");
        thread::sleep(Duration::from_millis(30));
        // Closing the socket ends the upgraded stream.
    });

    let client = Client::new(config_for(addr));
    let request = Request::builder(linkpool::Method::GET, "/ws")
        .header(linkpool::http::header::UPGRADE, "websocket")
        .header(linkpool::http::header::CONNECTION, "Upgrade")
        .build()
        .expect("build");
    let response = client.apply(request).await.expect("response");
    assert_eq!(response.status(), 101);

    let body = response.take_body().expect("take_body").to_bytes().await.expect("to_bytes");
    assert!(body.is_empty(), "a 101 response's content is always empty");

    let mut upgraded = response.upgrade().expect("upgrade");
    let mut buf = [0u8; 4];
    upgraded.read_exact(&mut buf).await.expect("read leftover + live bytes");
    assert_eq!(buf, [0xDE, 0xAD, 0xBE, 0xEF]);

    let n = upgraded.read(&mut buf).await.expect("read after close");
    assert_eq!(n, 0, "the server closed the upgraded socket");
}

/// A second `upgrade()` call on the same response fails; the content
/// stays the distinguished empty value regardless.
#[tokio::test]
async fn second_upgrade_attempt_is_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        read_request_head(&mut stream);
        stream
            .write_all(b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\n\r\n")
            .expect("write");
        thread::sleep(Duration::from_millis(30));
    });

    let client = Client::new(config_for(addr));
    let request = Request::builder(linkpool::Method::GET, "/ws")
        .header(linkpool::http::header::UPGRADE, "websocket")
        .build()
        .expect("build");
    let response = client.apply(request).await.expect("response");

    let _first = response.upgrade().expect("first upgrade succeeds");
    let err = response.upgrade().expect_err("second upgrade must fail");
    assert!(err.is_stream_already_consumed());
}

/// `upgrade()` on a non-101 response fails with `UpgradeRefused`.
#[tokio::test]
async fn upgrade_on_ordinary_response_is_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        read_request_head(&mut stream);
        stream
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok")
            .expect("write");
    });

    let client = Client::new(config_for(addr));
    let request = Request::get("/plain").build().expect("build");
    let response = client.apply(request).await.expect("response");

    let err = response.upgrade().expect_err("non-101 response refuses upgrade");
    assert!(err.is_upgrade_refused());
}

#![cfg(test)]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;

use linkpool::{Client, ClientConfig, Request};

/// Spawns a blocking server that reads one HTTP/1.1 request off each
/// accepted connection and replies with `response` verbatim, looping for
/// `connections` accepted sockets.
fn spawn_server(connections: usize, response: &'static [u8]) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    thread::spawn(move || {
        for _ in 0..connections {
            let (mut stream, _) = listener.accept().expect("accept");
            read_request_head(&mut stream);
            stream.write_all(response).expect("write");
        }
    });
    addr
}

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

#[tokio::test]
async fn single_get_reuses_connection() {
    let addr = spawn_server(2, b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello");
    let client = Client::new(config_for(addr));

    let request = Request::get("/a").build().expect("build");
    let response = client.apply(request).await.expect("response");
    assert_eq!(response.status(), 200);
    let body = response
        .take_body()
        .expect("take_body")
        .to_bytes()
        .await
        .expect("to_bytes");
    assert_eq!(&body[..], b"hello");

    // The connection was released back to the pool; a second request on
    // the same (max_connections=1) pool must not have to dial again.
    let request = Request::get("/b").build().expect("build");
    let response = client.apply(request).await.expect("response");
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn abandoned_body_still_releases_connection() {
    let big = vec![b'x'; 1024 * 1024];
    let mut response = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", big.len()).into_bytes();
    response.extend_from_slice(&big);
    let response: &'static [u8] = Box::leak(response.into_boxed_slice());

    let addr = spawn_server(2, response);
    let client = Client::new(config_for(addr));

    {
        let request = Request::get("/big").build().expect("build");
        let got = client.apply(request).await.expect("response");
        let mut body = got.take_body().expect("take_body");
        // Read a handful of bytes, then drop the rest unread.
        let _ = body.next_chunk().await;
    }

    // Reuse still works: the pool must have drained the rest of the body
    // off the wire before the connection went back to `available`.
    let request = Request::get("/small").build().expect("build");
    let got = client.apply(request).await.expect("second response");
    assert_eq!(got.status(), 200);
}

#[tokio::test]
async fn non_get_redirect_is_rejected() {
    let addr = spawn_server(
        1,
        b"HTTP/1.1 302 Found\r\nLocation: /b\r\nContent-Length: 0\r\n\r\n",
    );
    let client = Client::new(config_for(addr));

    let request = Request::builder(linkpool::Method::POST, "/a")
        .body(linkpool::Body::from_bytes(&b"data"[..]))
        .build()
        .expect("build");
    let err = client
        .apply_with_redirects(request)
        .await
        .expect_err("non-GET redirect must fail");
    assert!(err.is_auto_redirect_not_supported());
}

#[tokio::test]
async fn get_redirect_follows_location() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    thread::spawn(move || {
        for i in 0..2 {
            let (mut stream, _) = listener.accept().expect("accept");
            read_request_head(&mut stream);
            if i == 0 {
                stream
                    .write_all(b"HTTP/1.1 302 Found\r\nLocation: /b\r\nContent-Length: 0\r\n\r\n")
                    .expect("write");
            } else {
                stream
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok")
                    .expect("write");
            }
        }
    });

    let client = Client::new(config_for(addr));
    let request = Request::get("/a").build().expect("build");
    let response = client.apply_with_redirects(request).await.expect("response");
    assert_eq!(response.status(), 200);
    let body = response
        .take_body()
        .expect("take_body")
        .to_bytes()
        .await
        .expect("to_bytes");
    assert_eq!(&body[..], b"ok");
}

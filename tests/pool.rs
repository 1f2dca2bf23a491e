#![cfg(test)]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use linkpool::{Client, ClientConfig, Request};

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

fn config_for(addr: std::net::SocketAddr, max_connections: usize, max_waiters: usize) -> ClientConfig {
    ClientConfig::builder(addr.ip().to_string())
        .port(addr.port())
        .max_connections(max_connections)
        .max_waiters(max_waiters)
        .build()
}

/// Scenario 2 from the testable-properties list: a one-connection,
/// one-waiter pool serializes a second concurrent request behind the
/// first and rejects a third outright.
#[tokio::test]
async fn waiter_queue_serializes_then_rejects_overflow() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    thread::spawn(move || {
        for _ in 0..2 {
            let (mut stream, _) = listener.accept().expect("accept");
            read_request_head(&mut stream);
            // Hold the first connection open for a while so the second
            // `apply` call is forced to queue as a waiter.
            thread::sleep(Duration::from_millis(80));
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok")
                .expect("write");
        }
    });

    let client = std::sync::Arc::new(Client::new(config_for(addr, 1, 1)));

    let first = {
        let client = client.clone();
        tokio::spawn(async move {
            let req = Request::get("/first").build().expect("build");
            client.apply(req).await
        })
    };

    // Give the first request time to dial and start waiting on the slow
    // server's response head, so the pool's single connection is in use
    // when the second request arrives.
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Second request: queues as the pool's one allowed waiter.
    let second_client = client.clone();
    let second = tokio::spawn(async move {
        let req = Request::get("/second").build().expect("build");
        second_client.apply(req).await
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Third request: the waiter queue is already full.
    let req = Request::get("/third").build().expect("build");
    let err = client
        .apply(req)
        .await
        .expect_err("third concurrent request must be rejected");
    assert!(err.is_too_many_waiters());

    let second_result = second.await.expect("second task");
    assert_eq!(second_result.expect("second response").status(), 200);

    let first_result = first.await.expect("first task");
    assert_eq!(first_result.expect("first response").status(), 200);
}

/// Scenario 7: `stop()` while a waiter is queued fails the waiter with
/// `ClientAlreadyClosed`, and the pool accepts no further work afterward.
#[tokio::test]
async fn stop_fails_queued_waiters() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        read_request_head(&mut stream);
        thread::sleep(Duration::from_millis(150));
        let _ = stream.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok");
    });

    let client = std::sync::Arc::new(Client::new(config_for(addr, 1, 1)));

    let holder = {
        let client = client.clone();
        tokio::spawn(async move {
            let req = Request::get("/hold").build().expect("build");
            client.apply(req).await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let waiter = {
        let client = client.clone();
        tokio::spawn(async move {
            let req = Request::get("/wait").build().expect("build");
            client.apply(req).await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    client.stop().await;

    let waiter_result = waiter.await.expect("waiter task");
    let err = waiter_result.expect_err("queued waiter must fail once the pool stops");
    assert!(err.is_client_already_closed());

    // The in-flight request on the already-dialed connection is allowed to
    // finish; `stop()` only forecloses on idle and queued work.
    let _ = holder.await.expect("holder task");

    let req = Request::get("/after").build().expect("build");
    let err = client
        .apply(req)
        .await
        .expect_err("a stopped client must reject new work");
    assert!(err.is_client_already_closed());
}

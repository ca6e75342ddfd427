/*
 * http_integration.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Integration tests for the HTTP client session. The local test runs a full
 * request/response cycle against an in-process server; the network test
 * performs a real HTTPS GET and verifies TLS, keep-alive and gzip handling.
 *
 * Run with:
 *   cargo test -p corriere_core --test http_integration -- --nocapture
 */

use std::io::{Read, Write};
use std::net::TcpListener;

use corriere_core::{ClientSession, RequestBuilder};

fn read_request(socket: &mut std::net::TcpStream) -> Vec<u8> {
    let mut received = Vec::new();
    let mut buf = [0u8; 4096];
    while !received.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        received.extend_from_slice(&buf[..n]);
    }
    received
}

#[test]
fn full_cycle_against_local_server() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = std::thread::spawn(move || {
        let (mut socket, _) = listener.accept().unwrap();
        let mut requests = Vec::new();

        // First exchange: POST with a JSON body, chunked response.
        let received = read_request(&mut socket);
        let body_start = received.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
        let mut body = received[body_start..].to_vec();
        let mut buf = [0u8; 4096];
        while body.len() < 12 {
            let n = socket.read(&mut buf).unwrap();
            body.extend_from_slice(&buf[..n]);
        }
        requests.push((received[..body_start].to_vec(), body));
        socket
            .write_all(
                b"HTTP/1.1 201 Created\r\nTransfer-Encoding: chunked\r\n\r\n\
                  7\r\ncreated\r\n0\r\n\r\n",
            )
            .unwrap();

        // Second exchange on the same connection: plain GET.
        let received = read_request(&mut socket);
        requests.push((received, Vec::new()));
        socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\ndone")
            .unwrap();
        requests
    });

    let mut session = ClientSession::new().unwrap();
    session.set_auth_basic("user", "pass");

    let request = RequestBuilder::post(&format!("http://127.0.0.1:{}/items", port), false)
        .json()
        .utf8()
        .body("{\"name\":\"x\"}")
        .build()
        .unwrap();
    let response = session.send(request).unwrap();
    assert_eq!(response.status(), 201);
    assert_eq!(response.data(), b"created");

    let request = RequestBuilder::get(&format!("http://127.0.0.1:{}/items", port), false)
        .query("page", "1", false)
        .build()
        .unwrap();
    let response = session.send(request).unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.data(), b"done");

    let requests = server.join().unwrap();
    let first = String::from_utf8_lossy(&requests[0].0).to_string();
    assert!(first.starts_with("POST /items HTTP/1.1\r\n"));
    assert!(first.contains("Content-Type: application/json; charset=utf-8"));
    assert!(first.contains("Authorization: Basic dXNlcjpwYXNz"));
    assert_eq!(requests[0].1, b"{\"name\":\"x\"}".to_vec());
    let second = String::from_utf8_lossy(&requests[1].0).to_string();
    assert!(second.starts_with("GET /items?page=1 HTTP/1.1\r\n"));
}

#[test]
#[ignore] // requires network; run with: cargo test --test http_integration -- --ignored --nocapture
fn https_get_real_server() {
    let host = "example.com";

    println!("=== HTTPS Integration Test ===");
    println!("GET https://{}/ ...", host);

    let mut session = ClientSession::new().unwrap();
    session.set_accept_gzip(true);
    session.set_connect_timeout(10);
    session.set_read_timeout(10);

    let request = RequestBuilder::get(&format!("https://{}/", host), false)
        .build()
        .unwrap();
    let response = session.send(request).unwrap();

    println!("Status: {} {}", response.status(), response.reason());
    for (name, value) in response.headers() {
        println!("{}: {}", name, value);
    }
    println!("\nBody length: {} bytes", response.data().len());

    assert_eq!(response.status(), 200);
    assert!(!response.data().is_empty());
    let body = String::from_utf8_lossy(response.data());
    assert!(body.contains("<html"), "body should be HTML");

    println!("\n=== PASS ===");
}

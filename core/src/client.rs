/*
 * client.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Corriere, an HTTP client library.
 *
 * Corriere is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Corriere is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Corriere.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Per-connection exchange engine. One `Client` drives one connection at a
//! time through resolve, connect, write, read and parse, under connect and
//! read deadlines. The public API blocks: the exchange runs as a task on the
//! shared runtime and the caller waits on a oneshot channel for the single
//! terminal value. A clonable `CloseHandle` cancels an in-flight exchange
//! from any thread; the cancelled exchange still delivers its terminal value.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::runtime::Handle;
use tokio::sync::{oneshot, Notify};

use crate::error::{Error, ErrorKind};
use crate::parser::ResponseParser;
use crate::request::{Body, Method, Request};
use crate::response::Response;
use crate::transport::{self, Transport};

/// Default read buffer size in bytes.
pub const BUFFER_SIZE: usize = 1024;

/// Default read timeout in seconds.
pub const READ_TIMEOUT: u64 = 30;

/// Progress observer: (body bytes received so far, declared total if known).
pub type ProgressCallback = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

struct CloseSignal {
    closed: AtomicBool,
    notify: Notify,
}

impl CloseSignal {
    fn new() -> Self {
        Self {
            closed: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Resolve when close() has been called, consuming the signal. The flag
    /// is re-checked after arming the notify so a concurrent close is never
    /// missed.
    async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.closed.swap(false, Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }

    /// Consume a pending close, if any.
    fn consume(&self) -> bool {
        self.closed.swap(false, Ordering::SeqCst)
    }
}

/// Cancels an exchange of the `Client` it was taken from. The signal is
/// sticky until an exchange consumes it: a close with no exchange in flight
/// cancels the next request, so a close racing a request start is never
/// lost.
#[derive(Clone)]
pub struct CloseHandle {
    signal: Arc<CloseSignal>,
}

impl CloseHandle {
    pub fn close(&self) {
        self.signal.close();
    }
}

/// HTTP client engine for a single connection. Sequential use only: one
/// exchange at a time, keep-alive reuse across exchanges.
pub struct Client {
    handle: Handle,
    transport: Option<Transport>,
    response: Option<Response>,
    buffer_size: usize,
    /// Connect deadline in seconds; 0 disables the engine-driven deadline.
    connect_timeout: u64,
    /// Read deadline in seconds, re-armed after every received chunk.
    read_timeout: u64,
    progress: Option<ProgressCallback>,
    close: Arc<CloseSignal>,
}

impl Client {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            transport: None,
            response: None,
            buffer_size: BUFFER_SIZE,
            connect_timeout: 0,
            read_timeout: READ_TIMEOUT,
            progress: None,
            close: Arc::new(CloseSignal::new()),
        }
    }

    /// Read buffer size; 0 keeps the current value.
    pub fn set_buffer_size(&mut self, size: usize) {
        if size > 0 {
            self.buffer_size = size;
        }
    }

    /// Connect timeout in seconds; 0 disables it. Covers resolve, TCP
    /// connect and TLS handshake together.
    pub fn set_connect_timeout(&mut self, seconds: u64) {
        self.connect_timeout = seconds;
    }

    /// Read timeout in seconds; must be positive, other values keep the
    /// current timeout.
    pub fn set_read_timeout(&mut self, seconds: u64) {
        if seconds > 0 {
            self.read_timeout = seconds;
        }
    }

    pub fn set_progress_callback(&mut self, callback: Option<ProgressCallback>) {
        self.progress = callback;
    }

    /// Whether a connection from a previous keep-alive exchange is cached.
    pub fn connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Handle for cancelling an in-flight exchange from another thread.
    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            signal: Arc::clone(&self.close),
        }
    }

    /// Drop the cached connection. With `&mut self` no exchange can be in
    /// flight; cross-thread cancellation goes through `close_handle()`.
    pub fn close(&mut self) {
        self.transport = None;
    }

    /// Drop the stored response. Idempotent; callable before any request.
    pub fn reset(&mut self) {
        self.response = None;
    }

    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    pub fn take_response(&mut self) -> Option<Response> {
        self.response.take()
    }

    /// Perform one blocking request/response exchange. With `stream` the
    /// response body is spooled to a temporary file instead of memory. On
    /// success the response is available via `response()`; on any failure the
    /// connection is dropped and the engine is idle and reusable. Must not be
    /// called from within the runtime.
    pub fn request(&mut self, request: Request, stream: bool) -> Result<(), Error> {
        self.response = None;
        // A close issued before this request started still cancels it.
        if self.close.consume() {
            self.transport = None;
            return Err(Error::new(ErrorKind::Connect, "request cancelled"));
        }

        let exchange = Exchange {
            transport: self.transport.take(),
            request,
            stream,
            buffer_size: self.buffer_size,
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
            progress: self.progress.clone(),
            close: Arc::clone(&self.close),
        };
        let (tx, rx) = oneshot::channel();
        self.handle.spawn(async move {
            // The receiver may have gone away; nothing to do then.
            let _ = tx.send(exchange.run().await);
        });
        match rx.blocking_recv() {
            Ok(Ok((transport, response))) => {
                self.transport = transport;
                self.response = Some(response);
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::new(ErrorKind::SocketRead, "exchange task dropped")),
        }
    }
}

/// Owned state of one exchange, moved onto the runtime for its duration and
/// handed back through the oneshot channel.
struct Exchange {
    transport: Option<Transport>,
    request: Request,
    stream: bool,
    buffer_size: usize,
    connect_timeout: u64,
    read_timeout: u64,
    progress: Option<ProgressCallback>,
    close: Arc<CloseSignal>,
}

impl Exchange {
    async fn run(mut self) -> Result<(Option<Transport>, Response), Error> {
        let mut transport = match self.transport.take() {
            Some(t) => t,
            None => self.connect().await?,
        };

        self.write_request(&mut transport).await?;
        let response = self.read_response(&mut transport).await?;

        let keep = self.request.keep_alive() && response.is_keep_alive();
        Ok((if keep { Some(transport) } else { None }, response))
    }

    /// Resolve, connect and (for https) handshake, under the connect
    /// deadline when one is set.
    async fn connect(&self) -> Result<Transport, Error> {
        let url = self.request.url();
        let host = url.host().to_string();
        let port = url.effective_port();
        let tls = url.is_https();
        let establish = async move {
            let addrs = transport::resolve(&host, port).await?;
            let tcp = transport::connect(&addrs).await?;
            if tls {
                Transport::handshake(tcp, &host).await
            } else {
                Ok(Transport::Plain(tcp))
            }
        };
        let deadline = async {
            if self.connect_timeout > 0 {
                tokio::time::sleep(Duration::from_secs(self.connect_timeout)).await;
            } else {
                std::future::pending::<()>().await;
            }
        };
        tokio::select! {
            result = establish => result,
            _ = deadline => Err(Error::new(
                ErrorKind::ConnectTimeout,
                format!("connect timed out after {}s", self.connect_timeout),
            )),
            _ = self.close.wait() => Err(Error::new(ErrorKind::Connect, "connect cancelled")),
        }
    }

    async fn write_request(&self, transport: &mut Transport) -> Result<(), Error> {
        let write = async {
            let head = self.request.header_block();
            transport
                .write_all(head.as_bytes())
                .await
                .map_err(|e| Error::new(ErrorKind::SocketWrite, e.to_string()))?;
            match self.request.body() {
                Body::Empty => {}
                Body::Bytes(data) => {
                    transport
                        .write_all(data)
                        .await
                        .map_err(|e| Error::new(ErrorKind::SocketWrite, e.to_string()))?;
                }
                Body::File { path, chunk_size } => {
                    let mut file = tokio::fs::File::open(path)
                        .await
                        .map_err(|e| Error::new(ErrorKind::File, format!("{:?}: {}", path, e)))?;
                    let mut buf = vec![0u8; *chunk_size];
                    loop {
                        let n = file
                            .read(&mut buf)
                            .await
                            .map_err(|e| Error::new(ErrorKind::File, format!("{:?}: {}", path, e)))?;
                        if n == 0 {
                            transport
                                .write_all(b"0\r\n\r\n")
                                .await
                                .map_err(|e| Error::new(ErrorKind::SocketWrite, e.to_string()))?;
                            break;
                        }
                        let frame = format!("{:x}\r\n", n);
                        transport
                            .write_all(frame.as_bytes())
                            .await
                            .map_err(|e| Error::new(ErrorKind::SocketWrite, e.to_string()))?;
                        transport
                            .write_all(&buf[..n])
                            .await
                            .map_err(|e| Error::new(ErrorKind::SocketWrite, e.to_string()))?;
                        transport
                            .write_all(b"\r\n")
                            .await
                            .map_err(|e| Error::new(ErrorKind::SocketWrite, e.to_string()))?;
                    }
                }
            }
            transport
                .flush()
                .await
                .map_err(|e| Error::new(ErrorKind::SocketWrite, e.to_string()))
        };
        tokio::select! {
            result = write => result,
            _ = self.close.wait() => Err(Error::new(ErrorKind::SocketWrite, "write cancelled")),
        }
    }

    /// Read loop: each chunk is awaited under a fresh read deadline, so the
    /// timeout measures silence since the last byte, not total elapsed time.
    async fn read_response(&self, transport: &mut Transport) -> Result<Response, Error> {
        let mut parser = ResponseParser::new();
        parser.init(self.stream);
        if self.request.method() == Method::Head {
            parser.set_ignore_body(true);
        }

        let timeout = Duration::from_secs(self.read_timeout);
        let mut buf = BytesMut::with_capacity(self.buffer_size);
        let mut chunk = vec![0u8; self.buffer_size];
        loop {
            let n = tokio::select! {
                read = tokio::time::timeout(timeout, transport.read(&mut chunk)) => match read {
                    Ok(Ok(n)) => n,
                    Ok(Err(e)) => return Err(Error::new(ErrorKind::SocketRead, e.to_string())),
                    Err(_) => {
                        return Err(Error::new(
                            ErrorKind::ReadTimeout,
                            format!("read timed out after {}s", self.read_timeout),
                        ))
                    }
                },
                _ = self.close.wait() => {
                    return Err(Error::new(ErrorKind::SocketRead, "read cancelled"))
                }
            };
            if n == 0 {
                parser.on_eof()?;
            } else {
                buf.extend_from_slice(&chunk[..n]);
                parser.receive(&mut buf)?;
            }
            if let Some(callback) = &self.progress {
                if parser.header_ended() {
                    callback(parser.body_length(), parser.content_length());
                }
            }
            if parser.finished() {
                break;
            }
        }
        parser
            .take_response()
            .ok_or_else(|| Error::new(ErrorKind::Parse, "no response produced"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RequestBuilder;
    use std::io::{Read as _, Write as _};
    use std::net::TcpListener;
    use std::time::Instant;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap()
    }

    /// One-shot server: accept a connection, read until the header terminator,
    /// send the canned response, keep the socket open until the thread ends.
    fn serve_once(response: &'static [u8]) -> (u16, std::thread::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = std::thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            while !received.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response).unwrap();
            received
        });
        (port, handle)
    }

    fn get(port: u16) -> Request {
        RequestBuilder::get(&format!("http://127.0.0.1:{}/", port), false)
            .build()
            .unwrap()
    }

    #[test]
    fn successful_exchange() {
        let rt = runtime();
        let (port, server) =
            serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello");
        let mut client = Client::new(rt.handle().clone());
        client.request(get(port), false).unwrap();
        let response = client.response().unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.data(), b"hello");
        assert!(client.connected());
        let received = server.join().unwrap();
        assert!(received.starts_with(b"GET / HTTP/1.1\r\n"));
    }

    #[test]
    fn keep_alive_reuses_the_connection() {
        let rt = runtime();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = std::thread::spawn(move || {
            // A single accept serves both exchanges.
            let (mut socket, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4096];
            for _ in 0..2 {
                let mut received = Vec::new();
                while !received.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut buf).unwrap();
                    received.extend_from_slice(&buf[..n]);
                }
                socket
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok")
                    .unwrap();
            }
        });
        let mut client = Client::new(rt.handle().clone());
        client.request(get(port), false).unwrap();
        assert!(client.connected());
        client.request(get(port), false).unwrap();
        assert_eq!(client.response().unwrap().data(), b"ok");
        server.join().unwrap();
    }

    #[test]
    fn connection_close_drops_the_transport() {
        let rt = runtime();
        let (port, server) = serve_once(
            b"HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Length: 2\r\n\r\nok",
        );
        let mut client = Client::new(rt.handle().clone());
        client.request(get(port), false).unwrap();
        assert!(!client.connected());
        server.join().unwrap();
    }

    #[test]
    fn read_timeout_measures_silence() {
        let rt = runtime();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = std::thread::spawn(move || {
            // Send a partial response, then go silent.
            let (mut socket, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).unwrap();
            socket.write_all(b"HTTP/1.1 200 OK\r\n").unwrap();
            std::thread::sleep(Duration::from_secs(3));
        });
        let mut client = Client::new(rt.handle().clone());
        client.set_read_timeout(1);
        let e = client.request(get(port), false).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::ReadTimeout);
        assert!(e.timeout());
        assert!(!client.connected());
        server.join().unwrap();
    }

    #[test]
    fn close_unblocks_the_waiter() {
        let rt = runtime();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = std::thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).unwrap();
            std::thread::sleep(Duration::from_secs(2));
        });
        let mut client = Client::new(rt.handle().clone());
        client.set_read_timeout(30);
        let handle = client.close_handle();
        let closer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            handle.close();
        });
        let start = Instant::now();
        let e = client.request(get(port), false).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::SocketRead);
        assert!(start.elapsed() < Duration::from_secs(2));
        closer.join().unwrap();
        server.join().unwrap();
    }

    #[test]
    fn close_before_request_cancels_it() {
        let rt = runtime();
        let (port, server) =
            serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok");
        let mut client = Client::new(rt.handle().clone());
        // A close landing before request() starts must not be lost.
        client.close_handle().close();
        let e = client.request(get(port), false).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Connect);
        // The signal is consumed; the next request proceeds normally.
        client.request(get(port), false).unwrap();
        assert_eq!(client.response().unwrap().data(), b"ok");
        server.join().unwrap();
    }

    #[test]
    fn connect_timeout_fires_on_unaccepted_connection() {
        let rt = runtime();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let port = addr.port();
        // Saturate the accept backlog so the next connect hangs in SYN
        // retransmission instead of completing or being refused.
        let mut fillers = Vec::new();
        while fillers.len() < 600 {
            match std::net::TcpStream::connect_timeout(&addr, Duration::from_millis(250)) {
                Ok(socket) => fillers.push(socket),
                Err(_) => break,
            }
        }
        if fillers.len() == 600 {
            // Backlog would not saturate on this host; nothing to measure.
            return;
        }
        let mut client = Client::new(rt.handle().clone());
        client.set_connect_timeout(1);
        let start = Instant::now();
        let e = client.request(get(port), false).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::ConnectTimeout);
        assert!(e.timeout());
        assert!(!client.connected());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn connect_refused_is_connect_error() {
        let rt = runtime();
        // Bind and drop to find a port with no listener.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut client = Client::new(rt.handle().clone());
        let e = client.request(get(port), false).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Connect);
    }

    #[test]
    fn unknown_host_is_resolve_error() {
        let rt = runtime();
        let request = RequestBuilder::get("http://host.invalid/", false)
            .build()
            .unwrap();
        let mut client = Client::new(rt.handle().clone());
        let e = client.request(request, false).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::HostResolve);
    }

    #[test]
    fn slow_reader_receives_the_full_payload() {
        let rt = runtime();
        let payload = vec![0x5au8; 256 * 1024];
        let expected = payload.len();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = std::thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            // Drain slowly until the declared body length has arrived.
            loop {
                let n = socket.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
                if let Some(pos) = received.windows(4).position(|w| w == b"\r\n\r\n") {
                    if received.len() - pos - 4 >= expected {
                        break;
                    }
                }
                std::thread::sleep(Duration::from_millis(1));
            }
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n")
                .unwrap();
            received
        });
        let request = RequestBuilder::post(&format!("http://127.0.0.1:{}/", port), false)
            .body(payload.clone())
            .build()
            .unwrap();
        let mut client = Client::new(rt.handle().clone());
        client.request(request, false).unwrap();
        let received = server.join().unwrap();
        let pos = received.windows(4).position(|w| w == b"\r\n\r\n").unwrap();
        assert_eq!(&received[pos + 4..], &payload[..]);
    }

    #[test]
    fn progress_callback_reports_body_bytes() {
        let rt = runtime();
        let (port, server) =
            serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello");
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut client = Client::new(rt.handle().clone());
        client.set_progress_callback(Some(Arc::new(move |done, total| {
            sink.lock().unwrap().push((done, total));
        })));
        client.request(get(port), false).unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.last(), Some(&(5, Some(5))));
        server.join().unwrap();
    }

    #[test]
    fn reset_is_idempotent() {
        let rt = runtime();
        let mut client = Client::new(rt.handle().clone());
        client.reset();
        client.reset();
        assert!(client.response().is_none());
    }
}

/*
 * session.rs
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

//! Blocking client session: owns the runtime and a cache of engines keyed by
//! destination, so sequential requests to the same host reuse the kept-alive
//! connection. Fills in session-wide default headers before each send.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::runtime::Runtime;

use crate::client::{Client, CloseHandle, ProgressCallback};
use crate::error::{Error, ErrorKind};
use crate::request::Request;
use crate::response::Response;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PoolKey {
    tls: bool,
    host: String,
    port: u16,
}

/// Cancels whatever exchange the session currently has in flight. Clonable
/// and usable from any thread.
#[derive(Clone)]
pub struct SessionCanceller {
    current: Arc<Mutex<Option<CloseHandle>>>,
}

impl SessionCanceller {
    pub fn cancel(&self) {
        if let Ok(guard) = self.current.lock() {
            if let Some(handle) = guard.as_ref() {
                handle.close();
            }
        }
    }
}

/// A blocking HTTP client session. Single caller, sequential sends;
/// keep-alive connections are cached per destination between sends.
pub struct ClientSession {
    runtime: Runtime,
    clients: HashMap<PoolKey, Client>,
    /// Defaults merged into every request where the request has no own value.
    headers: Vec<(String, String)>,
    media_type: String,
    charset: String,
    buffer_size: usize,
    connect_timeout: u64,
    read_timeout: u64,
    current: Arc<Mutex<Option<CloseHandle>>>,
}

impl ClientSession {
    pub fn new() -> Result<Self, Error> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .map_err(|e| Error::new(ErrorKind::Config, format!("runtime: {}", e)))?;
        Ok(Self {
            runtime,
            clients: HashMap::new(),
            headers: vec![
                (
                    "User-Agent".to_string(),
                    format!("corriere/{}", env!("CARGO_PKG_VERSION")),
                ),
                ("Accept".to_string(), "*/*".to_string()),
                ("Accept-Encoding".to_string(), "identity".to_string()),
                ("Connection".to_string(), "Keep-Alive".to_string()),
            ],
            media_type: String::new(),
            charset: String::new(),
            buffer_size: 0,
            connect_timeout: 0,
            read_timeout: 0,
            current: Arc::new(Mutex::new(None)),
        })
    }

    /// Set a session default header, replacing any previous value.
    pub fn set_header(&mut self, key: &str, value: &str) {
        if let Some(entry) = self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
        {
            entry.1 = value.to_string();
        } else {
            self.headers.push((key.to_string(), value.to_string()));
        }
    }

    /// Default Content-Type for requests that carry a body but no media type
    /// of their own.
    pub fn set_content_type(&mut self, media_type: &str, charset: &str) {
        self.media_type = media_type.to_string();
        self.charset = charset.to_string();
    }

    pub fn set_accept(&mut self, content_types: &str) {
        self.set_header("Accept", content_types);
    }

    pub fn set_accept_gzip(&mut self, gzip: bool) {
        let value = if gzip { "gzip, deflate" } else { "identity" };
        self.set_header("Accept-Encoding", value);
    }

    pub fn set_auth(&mut self, auth_type: &str, credentials: &str) {
        let value = format!("{} {}", auth_type, credentials);
        self.set_header("Authorization", &value);
    }

    pub fn set_auth_basic(&mut self, login: &str, password: &str) {
        let credentials = BASE64.encode(format!("{}:{}", login, password));
        self.set_auth("Basic", &credentials);
    }

    pub fn set_auth_token(&mut self, token: &str) {
        self.set_auth("Token", token);
    }

    /// Read buffer size for the engines; 0 keeps the engine default.
    pub fn set_buffer_size(&mut self, size: usize) {
        self.buffer_size = size;
    }

    /// Connect timeout in seconds; 0 disables it.
    pub fn set_connect_timeout(&mut self, seconds: u64) {
        self.connect_timeout = seconds;
    }

    /// Read timeout in seconds; 0 keeps the engine default.
    pub fn set_read_timeout(&mut self, seconds: u64) {
        self.read_timeout = seconds;
    }

    /// Handle for cancelling the in-flight send from another thread.
    pub fn canceller(&self) -> SessionCanceller {
        SessionCanceller {
            current: Arc::clone(&self.current),
        }
    }

    /// Send a request with the body buffered in memory.
    pub fn send(&mut self, request: Request) -> Result<Response, Error> {
        self.send_with(request, false, None)
    }

    /// Send a request with the response body spooled to a temporary file.
    pub fn send_stream(&mut self, request: Request) -> Result<Response, Error> {
        self.send_with(request, true, None)
    }

    /// Send with explicit stream mode and an optional progress callback.
    pub fn send_with(
        &mut self,
        mut request: Request,
        stream: bool,
        progress: Option<ProgressCallback>,
    ) -> Result<Response, Error> {
        for (key, value) in &self.headers {
            request.set_missing_header(key, value);
        }
        if !self.media_type.is_empty() && !request.body().is_empty() {
            let value = if self.charset.is_empty() {
                self.media_type.clone()
            } else {
                format!("{}; charset={}", self.media_type, self.charset)
            };
            request.set_missing_header("Content-Type", &value);
        }

        let key = PoolKey {
            tls: request.url().is_https(),
            host: request.url().host().to_string(),
            port: request.url().effective_port(),
        };
        let mut client = match self.clients.remove(&key) {
            Some(client) => client,
            None => Client::new(self.runtime.handle().clone()),
        };
        client.set_buffer_size(self.buffer_size);
        client.set_connect_timeout(self.connect_timeout);
        client.set_read_timeout(self.read_timeout);
        client.set_progress_callback(progress);
        client.reset();

        if let Ok(mut guard) = self.current.lock() {
            *guard = Some(client.close_handle());
        }
        let result = client.request(request, stream);
        if let Ok(mut guard) = self.current.lock() {
            *guard = None;
        }

        match result {
            Ok(()) => {
                let response = client
                    .take_response()
                    .ok_or_else(|| Error::new(ErrorKind::Parse, "no response stored"))?;
                // Keep the engine only while its connection stays open.
                if client.connected() {
                    client.set_progress_callback(None);
                    self.clients.insert(key, client);
                }
                Ok(response)
            }
            Err(e) => Err(e),
        }
    }
}

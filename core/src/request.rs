/*
 * request.rs
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

//! Immutable HTTP request: method, URL, ordered headers, body. Built via
//! RequestBuilder; the client serializes and sends it without mutating it.
//! Headers keep insertion order and may repeat; every pair is sent.

use std::path::PathBuf;

use crate::url::Url;

/// Default chunk size for file-backed bodies.
pub const FILE_CHUNK_SIZE: usize = 1024;

/// HTTP request method (fixed set).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
        }
    }
}

/// Request body source. Bytes bodies are framed with Content-Length; file
/// bodies have unknown size up front and are sent with chunked framing,
/// re-read `chunk_size` bytes at a time.
#[derive(Debug, Clone)]
pub enum Body {
    Empty,
    Bytes(Vec<u8>),
    File { path: PathBuf, chunk_size: usize },
}

impl Body {
    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Bytes(b) => b.is_empty(),
            Body::File { .. } => false,
        }
    }
}

/// A fully built request. Immutable for the caller; the session may fill in
/// missing default headers (crate-private) before the exchange starts.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: Vec<(String, String)>,
    body: Body,
    keep_alive: bool,
}

impl Request {
    pub(crate) fn new(
        method: Method,
        url: Url,
        headers: Vec<(String, String)>,
        body: Body,
        keep_alive: bool,
    ) -> Self {
        Self {
            method,
            url,
            headers,
            body,
            keep_alive,
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// All headers, in insertion order, duplicates included.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    pub fn has_header(&self, key: &str) -> bool {
        self.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(key))
    }

    /// Append a header only if no header with that name exists yet. Used by
    /// the session to merge its defaults; never called by the engine.
    pub(crate) fn set_missing_header(&mut self, key: &str, value: &str) {
        if !self.has_header(key) {
            self.headers.push((key.to_string(), value.to_string()));
        }
    }

    /// Serialize the request line and header block, trailing blank line
    /// included. The body is written separately.
    pub(crate) fn header_block(&self) -> String {
        let mut out = format!(
            "{} {} HTTP/1.1\r\nHost: {}\r\n",
            self.method.as_str(),
            self.url.request_target(),
            self.url.host_header()
        );
        for (k, v) in &self.headers {
            out.push_str(k);
            out.push_str(": ");
            out.push_str(v);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        out
    }
}

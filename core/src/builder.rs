/*
 * builder.rs
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

//! Fluent request builder. Setters accumulate into a mutable draft;
//! `build()` validates the combination and materializes an immutable
//! `Request`. Mutually exclusive settings (plain body vs. form parts, gzip on
//! a non-memory body) are build errors, never silent precedence.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::{Error, ErrorKind};
use crate::form::{self, FormPart};
use crate::gzip;
use crate::request::{Body, Method, Request, FILE_CHUNK_SIZE};
use crate::url::Url;

#[derive(Debug, Clone)]
enum BodyDraft {
    Bytes(Vec<u8>),
    File { path: PathBuf, chunk_size: usize },
}

/// Builder for `Request`. Obtain one with `RequestBuilder::new()` or a
/// per-method shorthand (`RequestBuilder::get(url, encode)` etc.), chain
/// setters, then call `build()`.
#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
    method: Option<Method>,
    url: Option<Url>,
    headers: Vec<(String, String)>,
    body: Option<BodyDraft>,
    form_parts: Vec<FormPart>,
    media_type: String,
    charset: String,
    keep_alive: bool,
    gzip: bool,
    /// First setter error, surfaced at build().
    error: Option<Error>,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            keep_alive: true,
            ..Default::default()
        }
    }

    // Per-method shorthands: method + URL in one call.

    pub fn get(url: &str, encode: bool) -> Self {
        Self::new().method(Method::Get).url(url, encode)
    }

    pub fn head(url: &str, encode: bool) -> Self {
        Self::new().method(Method::Head).url(url, encode)
    }

    pub fn post(url: &str, encode: bool) -> Self {
        Self::new().method(Method::Post).url(url, encode)
    }

    pub fn put(url: &str, encode: bool) -> Self {
        Self::new().method(Method::Put).url(url, encode)
    }

    pub fn delete(url: &str, encode: bool) -> Self {
        Self::new().method(Method::Delete).url(url, encode)
    }

    pub fn patch(url: &str, encode: bool) -> Self {
        Self::new().method(Method::Patch).url(url, encode)
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn url(mut self, url: &str, encode: bool) -> Self {
        match Url::parse(url, encode) {
            Ok(u) => self.url = Some(u),
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        if let Some(url) = self.url.as_mut() {
            url.set_port(port);
        }
        self
    }

    /// Append a piece to the URL path.
    pub fn path(mut self, piece: &str, encode: bool) -> Self {
        if let Some(url) = self.url.as_mut() {
            url.append_path(piece, encode);
        }
        self
    }

    /// Append a parameter to the URL query.
    pub fn query(mut self, key: &str, value: &str, encode: bool) -> Self {
        if let Some(url) = self.url.as_mut() {
            url.append_query(key, value, encode);
        }
        self
    }

    /// Append a header. No deduplication: repeated names are all sent, in
    /// order.
    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    /// Media type for the Content-Type header, e.g. "application/json".
    pub fn media_type(mut self, media_type: &str) -> Self {
        self.media_type = media_type.to_string();
        self
    }

    /// Charset for the Content-Type header, e.g. "utf-8".
    pub fn charset(mut self, charset: &str) -> Self {
        self.charset = charset.to_string();
        self
    }

    /// Shorthand for media_type("application/json").
    pub fn json(self) -> Self {
        self.media_type("application/json")
    }

    /// Shorthand for charset("utf-8").
    pub fn utf8(self) -> Self {
        self.charset("utf-8")
    }

    /// Comma-separated content types to accept.
    pub fn accept(self, content_types: &str) -> Self {
        self.header("Accept", content_types)
    }

    /// Accept gzip-compressed response data or not.
    pub fn accept_gzip(self, gzip: bool) -> Self {
        if gzip {
            self.header("Accept-Encoding", "gzip, deflate")
        } else {
            self.header("Accept-Encoding", "identity")
        }
    }

    /// In-memory body, sent with Content-Length framing.
    pub fn body(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.body = Some(BodyDraft::Bytes(data.into()));
        self
    }

    /// File-backed body, streamed with chunked framing. `chunk_size` of 0
    /// keeps the default. The media type is inferred from the extension
    /// unless one was set explicitly.
    pub fn file(mut self, path: &Path, chunk_size: usize) -> Self {
        if self.media_type.is_empty() {
            if let Some(mt) = path
                .extension()
                .and_then(|e| form::media_type_from_extension(&e.to_string_lossy()))
            {
                self.media_type = mt.to_string();
            }
        }
        self.body = Some(BodyDraft::File {
            path: path.to_path_buf(),
            chunk_size: if chunk_size > 0 {
                chunk_size
            } else {
                FILE_CHUNK_SIZE
            },
        });
        self
    }

    /// Add a multipart form part.
    pub fn form(mut self, part: FormPart) -> Self {
        self.form_parts.push(part);
        self
    }

    /// Add a form part of string data.
    pub fn form_data(self, name: &str, data: impl Into<Vec<u8>>, media_type: &str) -> Self {
        self.form(FormPart::new(name, data, media_type))
    }

    /// Add a form part of a file. Read errors surface at build().
    pub fn form_file(mut self, name: &str, path: &Path, media_type: &str) -> Self {
        match FormPart::file(name, path, media_type) {
            Ok(part) => self.form_parts.push(part),
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Authorization header: "<type> <credentials>".
    pub fn auth(self, auth_type: &str, credentials: &str) -> Self {
        let value = format!("{} {}", auth_type, credentials);
        self.header("Authorization", &value)
    }

    /// Basic authorization from login and password.
    pub fn auth_basic(self, login: &str, password: &str) -> Self {
        let credentials = BASE64.encode(format!("{}:{}", login, password));
        self.auth("Basic", &credentials)
    }

    /// Token authorization.
    pub fn auth_token(self, token: &str) -> Self {
        self.auth("Token", token)
    }

    /// Add a Date header with the current time in IMF-fixdate format.
    pub fn date(self) -> Self {
        let value = chrono::Utc::now()
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string();
        self.header("Date", &value)
    }

    /// Compress the body with gzip before sending. Only valid for in-memory
    /// bodies; bodies at or below the size threshold are sent as identity.
    pub fn gzip(mut self, gzip: bool) -> Self {
        self.gzip = gzip;
        self
    }

    /// Validate and materialize the request.
    pub fn build(self) -> Result<Request, Error> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let method = self
            .method
            .ok_or_else(|| Error::new(ErrorKind::Config, "no method set"))?;
        let url = self
            .url
            .ok_or_else(|| Error::new(ErrorKind::Config, "no URL set"))?;
        if self.body.is_some() && !self.form_parts.is_empty() {
            return Err(Error::new(
                ErrorKind::Config,
                "both a body and form parts are set",
            ));
        }
        if self.gzip && !matches!(self.body, Some(BodyDraft::Bytes(_))) {
            return Err(Error::new(
                ErrorKind::Config,
                "gzip applies only to in-memory bodies",
            ));
        }

        let mut headers = self.headers;
        if !self.keep_alive {
            headers.push(("Connection".to_string(), "Close".to_string()));
        }

        let body = if !self.form_parts.is_empty() {
            let boundary = form::random_boundary();
            let data = form::encode_multipart(&self.form_parts, &boundary);
            push_missing(
                &mut headers,
                "Content-Type",
                &format!("multipart/form-data; boundary={}", boundary),
            );
            headers.push(("Content-Length".to_string(), data.len().to_string()));
            Body::Bytes(data)
        } else {
            match self.body {
                Some(BodyDraft::Bytes(mut data)) => {
                    push_content_type(&mut headers, &self.media_type, &self.charset);
                    if self.gzip && data.len() > gzip::GZIP_THRESHOLD {
                        data = gzip::compress(&data).map_err(|e| {
                            Error::new(ErrorKind::Config, format!("gzip: {}", e))
                        })?;
                        headers.push(("Content-Encoding".to_string(), "gzip".to_string()));
                    }
                    headers.push(("Content-Length".to_string(), data.len().to_string()));
                    Body::Bytes(data)
                }
                Some(BodyDraft::File { path, chunk_size }) => {
                    push_content_type(&mut headers, &self.media_type, &self.charset);
                    headers.push((
                        "Transfer-Encoding".to_string(),
                        "chunked".to_string(),
                    ));
                    Body::File { path, chunk_size }
                }
                None => Body::Empty,
            }
        };

        Ok(Request::new(method, url, headers, body, self.keep_alive))
    }
}

fn push_missing(headers: &mut Vec<(String, String)>, key: &str, value: &str) {
    if !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(key)) {
        headers.push((key.to_string(), value.to_string()));
    }
}

fn push_content_type(headers: &mut Vec<(String, String)>, media_type: &str, charset: &str) {
    if media_type.is_empty() {
        return;
    }
    let value = if charset.is_empty() {
        media_type.to_string()
    } else {
        format!("{}; charset={}", media_type, charset)
    };
    push_missing(headers, "Content-Type", &value);
}

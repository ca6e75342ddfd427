/*
 * response.rs
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

//! Parsed HTTP response.

use std::path::{Path, PathBuf};

/// Where the response body ended up: in memory, or spooled to a temporary
/// file when the exchange ran in stream mode.
#[derive(Debug)]
pub enum ResponseBody {
    Buffer(Vec<u8>),
    File(PathBuf),
}

/// A complete parsed response. Produced by the response parser once the
/// message ends; the status line, headers and body are all materialized.
#[derive(Debug)]
pub struct Response {
    status: u16,
    reason: String,
    headers: Vec<(String, String)>,
    body: ResponseBody,
}

impl Response {
    pub(crate) fn new(
        status: u16,
        reason: String,
        headers: Vec<(String, String)>,
        body: ResponseBody,
    ) -> Self {
        Self {
            status,
            reason,
            headers,
            body,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// All headers in wire order, duplicates included.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First header with the given name, case-insensitive.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the server agreed to keep the connection open. Absence of a
    /// Connection header means keep-alive (HTTP/1.1 default).
    pub fn is_keep_alive(&self) -> bool {
        match self.header("Connection") {
            Some(v) => !v.eq_ignore_ascii_case("close"),
            None => true,
        }
    }

    /// Body bytes. Empty when the body was streamed to a file.
    pub fn data(&self) -> &[u8] {
        match &self.body {
            ResponseBody::Buffer(data) => data,
            ResponseBody::File(_) => &[],
        }
    }

    /// Temporary file holding the body, when streamed. The caller owns the
    /// file and is responsible for removing it.
    pub fn file_path(&self) -> Option<&Path> {
        match &self.body {
            ResponseBody::Buffer(_) => None,
            ResponseBody::File(path) => Some(path),
        }
    }
}

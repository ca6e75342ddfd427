/*
 * parser.rs
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

//! HTTP/1.1 response push parser: status line, headers, body (Content-Length,
//! chunked, or read-until-close). Feed bytes via `receive`; partial data stays
//! in the buffer for the next call. The finished message is collected into a
//! `Response`, with the body held in memory or spooled to a temporary file.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use bytes::{Buf, BytesMut};
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::error::{Error, ErrorKind};
use crate::gzip;
use crate::response::{Response, ResponseBody};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    StatusLine,
    Headers,
    Body,
    ChunkSize,
    ChunkData,
    ChunkTrailer,
    Finished,
}

enum BodySink {
    Memory(Vec<u8>),
    File { file: File, path: PathBuf },
}

/// Push parser for an HTTP/1.1 response. `init` starts a new message;
/// `receive` consumes as much of the buffer as it can.
pub struct ResponseParser {
    state: ParseState,
    /// Spool the body to a temporary file instead of memory.
    stream: bool,
    /// Skip the body even when framing headers announce one (HEAD).
    ignore_body: bool,
    status: u16,
    reason: String,
    headers: Vec<(String, String)>,
    content_length: Option<u64>,
    chunked: bool,
    body_length: u64,
    chunk_remaining: u64,
    sink: Option<BodySink>,
    response: Option<Response>,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::StatusLine,
            stream: false,
            ignore_body: false,
            status: 0,
            reason: String::new(),
            headers: Vec::new(),
            content_length: None,
            chunked: false,
            body_length: 0,
            chunk_remaining: 0,
            sink: None,
            response: None,
        }
    }

    /// Reset for a new message. In stream mode the body is written to a
    /// temporary file as it arrives.
    pub fn init(&mut self, stream: bool) {
        *self = Self::new();
        self.stream = stream;
    }

    pub fn set_ignore_body(&mut self, ignore: bool) {
        self.ignore_body = ignore;
    }

    pub fn header_ended(&self) -> bool {
        !matches!(self.state, ParseState::StatusLine | ParseState::Headers)
    }

    pub fn finished(&self) -> bool {
        self.state == ParseState::Finished
    }

    /// Declared Content-Length, when the headers carried one.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Body bytes received so far.
    pub fn body_length(&self) -> u64 {
        self.body_length
    }

    /// The built response, once `finished()`.
    pub fn take_response(&mut self) -> Option<Response> {
        self.response.take()
    }

    fn find_crlf(buf: &[u8]) -> Option<usize> {
        let mut i = 0;
        while i + 1 < buf.len() {
            if buf[i] == b'\r' && buf[i + 1] == b'\n' {
                return Some(i);
            }
            i += 1;
        }
        None
    }

    /// Consume and parse as much as possible from buf. Partial tokens remain
    /// in buf for the next call.
    pub fn receive(&mut self, buf: &mut BytesMut) -> Result<(), Error> {
        while !buf.is_empty() {
            match self.state {
                ParseState::StatusLine => {
                    let line_end = match Self::find_crlf(buf) {
                        Some(n) => n,
                        None => return Ok(()),
                    };
                    let line = buf.split_to(line_end + 2); // include CRLF
                    let line_str = std::str::from_utf8(&line[..line_end])
                        .map_err(|_| Error::new(ErrorKind::Parse, "invalid status line"))?;
                    // HTTP/1.1 200 OK or HTTP/1.1 200
                    if !line_str.starts_with("HTTP/") {
                        return Err(Error::new(ErrorKind::Parse, "invalid status line"));
                    }
                    let parts: Vec<&str> = line_str.splitn(3, ' ').collect();
                    self.status = parts
                        .get(1)
                        .and_then(|s| s.parse::<u16>().ok())
                        .ok_or_else(|| Error::new(ErrorKind::Parse, "invalid status code"))?;
                    self.reason = parts.get(2).unwrap_or(&"").to_string();
                    self.state = ParseState::Headers;
                }
                ParseState::Headers => {
                    let line_end = match Self::find_crlf(buf) {
                        Some(n) => n,
                        None => return Ok(()),
                    };
                    if line_end == 0 {
                        buf.advance(2);
                        self.headers_ended()?;
                        continue;
                    }
                    let line = buf.split_to(line_end + 2);
                    let line_str = std::str::from_utf8(&line[..line_end])
                        .map_err(|_| Error::new(ErrorKind::Parse, "invalid header line"))?;
                    let colon = line_str
                        .find(':')
                        .ok_or_else(|| Error::new(ErrorKind::Parse, "invalid header line"))?;
                    let name = line_str[..colon].trim();
                    let value = line_str[colon + 1..].trim();
                    self.headers.push((name.to_string(), value.to_string()));
                }
                ParseState::Body => {
                    match self.content_length {
                        Some(cl) => {
                            let remaining = (cl - self.body_length) as usize;
                            let to_read = remaining.min(buf.len());
                            if to_read > 0 {
                                let chunk = buf.split_to(to_read);
                                self.append_body(&chunk)?;
                            }
                            if self.body_length >= cl {
                                self.finish()?;
                            }
                        }
                        None => {
                            // Read until close: take everything available.
                            let chunk = buf.split_to(buf.len());
                            self.append_body(&chunk)?;
                            return Ok(());
                        }
                    }
                }
                ParseState::ChunkSize => {
                    let line_end = match Self::find_crlf(buf) {
                        Some(n) => n,
                        None => return Ok(()),
                    };
                    let line = buf.split_to(line_end + 2);
                    let line_str = std::str::from_utf8(&line[..line_end])
                        .map_err(|_| Error::new(ErrorKind::Parse, "invalid chunk size"))?;
                    let hex_part = line_str.split(';').next().unwrap_or(line_str).trim();
                    self.chunk_remaining = u64::from_str_radix(hex_part, 16)
                        .map_err(|_| Error::new(ErrorKind::Parse, "invalid chunk size"))?;
                    if self.chunk_remaining == 0 {
                        self.state = ParseState::ChunkTrailer;
                    } else {
                        self.state = ParseState::ChunkData;
                    }
                }
                ParseState::ChunkData => {
                    let to_read = (self.chunk_remaining as usize).min(buf.len());
                    if to_read > 0 {
                        let chunk = buf.split_to(to_read);
                        self.append_body(&chunk)?;
                        self.chunk_remaining -= to_read as u64;
                    }
                    if self.chunk_remaining == 0 {
                        // Consume the CRLF after the chunk data
                        if buf.len() >= 2 {
                            buf.advance(2);
                            self.state = ParseState::ChunkSize;
                        } else {
                            return Ok(());
                        }
                    } else {
                        return Ok(());
                    }
                }
                ParseState::ChunkTrailer => {
                    let line_end = match Self::find_crlf(buf) {
                        Some(n) => n,
                        None => return Ok(()),
                    };
                    if line_end == 0 {
                        buf.advance(2);
                        self.finish()?;
                    } else {
                        // Trailer fields are consumed and discarded.
                        buf.advance(line_end + 2);
                    }
                }
                ParseState::Finished => return Ok(()),
            }
        }
        Ok(())
    }

    /// Signal end of input. Completes a read-until-close body; any other
    /// unfinished state means the peer closed mid-message.
    pub fn on_eof(&mut self) -> Result<(), Error> {
        match self.state {
            ParseState::Finished => Ok(()),
            ParseState::Body if self.content_length.is_none() => self.finish(),
            _ => Err(Error::new(
                ErrorKind::SocketRead,
                "connection closed before end of message",
            )),
        }
    }

    /// Transition out of the headers section once the empty line arrives.
    fn headers_ended(&mut self) -> Result<(), Error> {
        self.chunked = self
            .header("Transfer-Encoding")
            .map(|v| v.to_ascii_lowercase().contains("chunked"))
            .unwrap_or(false);
        self.content_length = match self.header("Content-Length") {
            Some(v) => Some(
                v.trim()
                    .parse::<u64>()
                    .map_err(|_| Error::new(ErrorKind::Parse, "invalid Content-Length"))?,
            ),
            None => None,
        };
        // HEAD responses and 204/304 have no body regardless of framing headers.
        if self.ignore_body || self.status == 204 || self.status == 304 {
            return self.finish();
        }
        if self.chunked {
            self.state = ParseState::ChunkSize;
        } else if self.content_length == Some(0) {
            self.finish()?;
        } else {
            // Some(n): fixed length; None: read until close.
            self.state = ParseState::Body;
        }
        Ok(())
    }

    fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    fn append_body(&mut self, data: &[u8]) -> Result<(), Error> {
        if self.sink.is_none() {
            self.sink = Some(if self.stream {
                let suffix: String = rand::thread_rng()
                    .sample_iter(&Alphanumeric)
                    .take(10)
                    .map(char::from)
                    .collect();
                let path = std::env::temp_dir().join(format!("corriere-{}.tmp", suffix));
                let file = File::create(&path)
                    .map_err(|e| Error::new(ErrorKind::File, format!("temp file: {}", e)))?;
                BodySink::File { file, path }
            } else {
                BodySink::Memory(Vec::new())
            });
        }
        match self.sink.as_mut() {
            Some(BodySink::Memory(vec)) => vec.extend_from_slice(data),
            Some(BodySink::File { file, .. }) => file
                .write_all(data)
                .map_err(|e| Error::new(ErrorKind::File, format!("temp file: {}", e)))?,
            None => unreachable!(),
        }
        self.body_length += data.len() as u64;
        Ok(())
    }

    /// Seal the message: flush the sink, decompress a gzip body held in
    /// memory, and build the Response.
    fn finish(&mut self) -> Result<(), Error> {
        let gzipped = self
            .header("Content-Encoding")
            .map(|v| v.to_ascii_lowercase().contains("gzip"))
            .unwrap_or(false);
        let body = match self.sink.take() {
            Some(BodySink::Memory(data)) => {
                if gzipped {
                    let data = gzip::decompress(&data)
                        .map_err(|e| Error::new(ErrorKind::Parse, format!("gzip: {}", e)))?;
                    ResponseBody::Buffer(data)
                } else {
                    ResponseBody::Buffer(data)
                }
            }
            Some(BodySink::File { mut file, path }) => {
                // Streamed bodies are written as received, gzip included.
                file.flush()
                    .map_err(|e| Error::new(ErrorKind::File, format!("temp file: {}", e)))?;
                ResponseBody::File(path)
            }
            None => ResponseBody::Buffer(Vec::new()),
        };
        self.response = Some(Response::new(
            self.status,
            std::mem::take(&mut self.reason),
            std::mem::take(&mut self.headers),
            body,
        ));
        self.state = ParseState::Finished;
        Ok(())
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

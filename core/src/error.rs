/*
 * error.rs
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

//! Client error type: one kind per failure class, no aggregation. A failed
//! request carries exactly the first error encountered; retries are the
//! caller's business.

use std::fmt;

/// What went wrong. Transport, timeout and parse failures are terminal for
/// the request that hit them; the client itself stays usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// DNS/address resolution of the target host failed.
    HostResolve,
    /// TCP connect failed (refused, unreachable, canceled).
    Connect,
    /// The configured connect deadline fired before the connection was up.
    ConnectTimeout,
    /// TLS handshake failed after the TCP connect succeeded.
    Handshake,
    /// Writing the request (headers or body) to the socket failed.
    SocketWrite,
    /// Reading the response from the socket failed (including premature EOF).
    SocketRead,
    /// The read deadline fired before the response was complete.
    ReadTimeout,
    /// The peer sent a malformed response.
    Parse,
    /// A body or form-part file could not be read, or a stream sink could not
    /// be created.
    File,
    /// The builder was given an invalid combination of settings.
    Config,
}

impl ErrorKind {
    fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::HostResolve => "host resolve error",
            ErrorKind::Connect => "connect error",
            ErrorKind::ConnectTimeout => "connect timeout",
            ErrorKind::Handshake => "TLS handshake error",
            ErrorKind::SocketWrite => "socket write error",
            ErrorKind::SocketRead => "socket read error",
            ErrorKind::ReadTimeout => "read timeout",
            ErrorKind::Parse => "response parse error",
            ErrorKind::File => "file error",
            ErrorKind::Config => "configuration error",
        }
    }
}

/// Error value returned by the client: a kind plus a human-readable detail.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// True for the two deadline kinds.
    pub fn timeout(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::ConnectTimeout | ErrorKind::ReadTimeout
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind.as_str())
        } else {
            write!(f, "{}: {}", self.kind.as_str(), self.message)
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_flag_covers_both_deadlines() {
        assert!(Error::new(ErrorKind::ConnectTimeout, "").timeout());
        assert!(Error::new(ErrorKind::ReadTimeout, "").timeout());
        assert!(!Error::new(ErrorKind::SocketRead, "").timeout());
    }

    #[test]
    fn display_includes_detail() {
        let e = Error::new(ErrorKind::Connect, "connection refused");
        assert_eq!(e.to_string(), "connect error: connection refused");
        let e = Error::new(ErrorKind::Parse, "");
        assert_eq!(e.to_string(), "response parse error");
    }
}

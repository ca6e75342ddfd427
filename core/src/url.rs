/*
 * url.rs
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

//! Minimal http/https URL: scheme, host, port, path, query. Percent-encoding
//! of path and query is opt-in (the `encode` flag), applied with the usual
//! component-specific safe sets.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::error::{Error, ErrorKind};

/// Path component: encode everything outside unreserved + path sub-delims.
/// Slashes are left alone so whole paths can be encoded in one pass.
const PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'?')
    .add(b'#')
    .add(b'{')
    .add(b'}')
    .add(b'%');

/// Query component: as PATH, plus the pair/list separators.
const QUERY: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'=')
    .add(b'+');

fn encode_path(s: &str) -> String {
    utf8_percent_encode(s, PATH).to_string()
}

fn encode_query_component(s: &str) -> String {
    utf8_percent_encode(s, QUERY).to_string()
}

/// Parsed request target. Only `http` and `https` schemes are accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Url {
    scheme: String,
    host: String,
    port: Option<u16>,
    path: String,
    query: String,
}

impl Url {
    /// Parse `scheme://host[:port][/path][?query]`. With `encode` true the
    /// path and query are percent-encoded; otherwise they are taken verbatim
    /// (the caller already encoded them).
    pub fn parse(input: &str, encode: bool) -> Result<Self, Error> {
        let rest = match input.split_once("://") {
            Some((scheme, rest)) => {
                let scheme = scheme.to_ascii_lowercase();
                if scheme != "http" && scheme != "https" {
                    return Err(Error::new(
                        ErrorKind::Config,
                        format!("unsupported URL scheme: {}", scheme),
                    ));
                }
                return Self::parse_rest(&scheme, rest, encode);
            }
            None => input,
        };
        // No scheme: default to http, like a URL typed without one.
        Self::parse_rest("http", rest, encode)
    }

    fn parse_rest(scheme: &str, rest: &str, encode: bool) -> Result<Self, Error> {
        let (authority, path_query) = match rest.find('/') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, ""),
        };
        if authority.is_empty() {
            return Err(Error::new(ErrorKind::Config, "URL has no host"));
        }
        // Bracketed IPv6 literals lose their brackets here; host_header()
        // puts them back on the wire.
        let (host, port) = if let Some(v6) = authority.strip_prefix('[') {
            let (host, tail) = v6.split_once(']').ok_or_else(|| {
                Error::new(ErrorKind::Config, "unterminated IPv6 host")
            })?;
            let port = match tail.strip_prefix(':') {
                Some(p) => Some(p.parse::<u16>().map_err(|_| {
                    Error::new(ErrorKind::Config, format!("invalid URL port: {}", p))
                })?),
                None if tail.is_empty() => None,
                None => {
                    return Err(Error::new(
                        ErrorKind::Config,
                        format!("invalid IPv6 authority: {}", authority),
                    ))
                }
            };
            (host.to_string(), port)
        } else {
            match authority.rsplit_once(':') {
                Some((h, p)) if !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()) => {
                    let port = p.parse::<u16>().map_err(|_| {
                        Error::new(ErrorKind::Config, format!("invalid URL port: {}", p))
                    })?;
                    (h.to_string(), Some(port))
                }
                _ => (authority.to_string(), None),
            }
        };
        let (path, query) = match path_query.split_once('?') {
            Some((p, q)) => (p.to_string(), q.to_string()),
            None => (path_query.to_string(), String::new()),
        };
        let path = if path.is_empty() {
            "/".to_string()
        } else if encode {
            encode_path(&path)
        } else {
            path
        };
        let query = if encode {
            encode_query_string(&query)
        } else {
            query
        };
        Ok(Self {
            scheme: scheme.to_string(),
            host,
            port,
            path,
            query,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn is_https(&self) -> bool {
        self.scheme == "https"
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Explicit port, if the URL carried one.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Port to connect to: explicit, or the scheme default (80 / 443).
    pub fn effective_port(&self) -> u16 {
        self.port
            .unwrap_or(if self.is_https() { 443 } else { 80 })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_port(&mut self, port: u16) {
        self.port = Some(port);
    }

    /// Append one path segment.
    pub fn append_path(&mut self, piece: &str, encode: bool) {
        let piece = piece.trim_matches('/');
        let piece = if encode {
            encode_path(piece)
        } else {
            piece.to_string()
        };
        if !self.path.ends_with('/') {
            self.path.push('/');
        }
        self.path.push_str(&piece);
    }

    /// Append one `key=value` query parameter.
    pub fn append_query(&mut self, key: &str, value: &str, encode: bool) {
        let (key, value) = if encode {
            (encode_query_component(key), encode_query_component(value))
        } else {
            (key.to_string(), value.to_string())
        };
        if !self.query.is_empty() {
            self.query.push('&');
        }
        self.query.push_str(&key);
        self.query.push('=');
        self.query.push_str(&value);
    }

    /// The request target as sent on the request line: path plus query.
    pub fn request_target(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query)
        }
    }

    /// Host header value: host, plus the port when it isn't the scheme
    /// default. IPv6 literals are re-bracketed.
    pub fn host_header(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        match self.port {
            Some(p) if p != self.effective_default() => format!("{}:{}", host, p),
            _ => host,
        }
    }

    fn effective_default(&self) -> u16 {
        if self.is_https() {
            443
        } else {
            80
        }
    }
}

/// Encode an already-assembled query string, preserving the & and = structure.
fn encode_query_string(query: &str) -> String {
    if query.is_empty() {
        return String::new();
    }
    query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => format!(
                "{}={}",
                encode_query_component(k),
                encode_query_component(v)
            ),
            None => encode_query_component(pair),
        })
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_url() {
        let u = Url::parse("https://example.com:8443/a/b?x=1&y=2", false).unwrap();
        assert_eq!(u.scheme(), "https");
        assert_eq!(u.host(), "example.com");
        assert_eq!(u.port(), Some(8443));
        assert_eq!(u.path(), "/a/b");
        assert_eq!(u.query(), "x=1&y=2");
        assert_eq!(u.host_header(), "example.com:8443");
    }

    #[test]
    fn default_ports() {
        let u = Url::parse("http://example.com", false).unwrap();
        assert_eq!(u.effective_port(), 80);
        assert_eq!(u.path(), "/");
        assert_eq!(u.host_header(), "example.com");
        let u = Url::parse("https://example.com/x", false).unwrap();
        assert_eq!(u.effective_port(), 443);
    }

    #[test]
    fn explicit_default_port_omitted_from_host_header() {
        let u = Url::parse("http://example.com:80/", false).unwrap();
        assert_eq!(u.host_header(), "example.com");
    }

    #[test]
    fn rejects_unknown_scheme() {
        let e = Url::parse("ftp://example.com", false).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Config);
    }

    #[test]
    fn append_query_builds_pairs() {
        let mut u = Url::parse("http://h/p", false).unwrap();
        u.append_query("a", "1", false);
        u.append_query("b", "2", false);
        assert_eq!(u.request_target(), "/p?a=1&b=2");
    }

    #[test]
    fn encode_flag_escapes_path_and_query() {
        let u = Url::parse("http://h/a b?k=v w", true).unwrap();
        assert_eq!(u.path(), "/a%20b");
        assert_eq!(u.query(), "k=v%20w");
    }

    #[test]
    fn append_path_segments() {
        let mut u = Url::parse("http://h", false).unwrap();
        u.append_path("api", false);
        u.append_path("v1/things", false);
        assert_eq!(u.path(), "/api/v1/things");
    }

    #[test]
    fn ipv6_host_is_unbracketed_for_resolution() {
        // The stored host is the bare address (what a resolver accepts);
        // only the Host header carries brackets.
        let u = Url::parse("http://[::1]:8080/", false).unwrap();
        assert_eq!(u.host(), "::1");
        assert_eq!(u.port(), Some(8080));
        assert_eq!(u.host_header(), "[::1]:8080");
    }

    #[test]
    fn ipv6_host_without_port() {
        let u = Url::parse("http://[2001:db8::2]/x", false).unwrap();
        assert_eq!(u.host(), "2001:db8::2");
        assert_eq!(u.effective_port(), 80);
        assert_eq!(u.host_header(), "[2001:db8::2]");
    }

    #[test]
    fn malformed_ipv6_authority_is_config_error() {
        let e = Url::parse("http://[::1/", false).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Config);
        let e = Url::parse("http://[::1]junk/", false).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Config);
    }
}

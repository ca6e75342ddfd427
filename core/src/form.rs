/*
 * form.rs
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

//! multipart/form-data parts and encoding. Parts are held in memory; file
//! parts are read when the part is created so build-time errors surface as
//! file errors, not mid-transfer failures.

use std::fs;
use std::path::Path;

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::error::{Error, ErrorKind};

/// One part of a multipart form: a named field or an uploaded file.
#[derive(Debug, Clone)]
pub struct FormPart {
    name: String,
    file_name: Option<String>,
    media_type: Option<String>,
    data: Vec<u8>,
}

impl FormPart {
    /// A data part. `media_type` is optional (e.g. "application/json" when the
    /// data is a JSON string).
    pub fn new(name: &str, data: impl Into<Vec<u8>>, media_type: &str) -> Self {
        Self {
            name: name.to_string(),
            file_name: None,
            media_type: if media_type.is_empty() {
                None
            } else {
                Some(media_type.to_string())
            },
            data: data.into(),
        }
    }

    /// A file part. The file name is taken from the path; the media type, if
    /// not given, is inferred from the extension.
    pub fn file(name: &str, path: &Path, media_type: &str) -> Result<Self, Error> {
        let data = fs::read(path).map_err(|e| {
            Error::new(ErrorKind::File, format!("{}: {}", path.display(), e))
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        let media_type = if media_type.is_empty() {
            path.extension()
                .and_then(|e| media_type_from_extension(&e.to_string_lossy()))
                .map(|s| s.to_string())
        } else {
            Some(media_type.to_string())
        };
        Ok(Self {
            name: name.to_string(),
            file_name,
            media_type,
            data,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Media type from a file extension; octet-stream territory returns None and
/// the part simply carries no Content-Type.
pub fn media_type_from_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "txt" => Some("text/plain"),
        "htm" | "html" => Some("text/html"),
        "css" => Some("text/css"),
        "csv" => Some("text/csv"),
        "xml" => Some("text/xml"),
        "json" => Some("application/json"),
        "pdf" => Some("application/pdf"),
        "zip" => Some("application/zip"),
        "gz" => Some("application/gzip"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

/// Random alphanumeric boundary, long enough not to collide with part data in
/// practice.
pub fn random_boundary() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(30)
        .map(char::from)
        .collect()
}

/// Encode parts as a complete multipart/form-data payload with the given
/// boundary (without the Content-Type header itself).
pub fn encode_multipart(parts: &[FormPart], boundary: &str) -> Vec<u8> {
    let mut out = Vec::new();
    for part in parts {
        out.extend_from_slice(b"--");
        out.extend_from_slice(boundary.as_bytes());
        out.extend_from_slice(b"\r\n");

        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name());
        if let Some(file_name) = part.file_name() {
            disposition.push_str(&format!("; filename=\"{}\"", file_name));
        }
        out.extend_from_slice(disposition.as_bytes());
        out.extend_from_slice(b"\r\n");

        if let Some(media_type) = part.media_type() {
            out.extend_from_slice(format!("Content-Type: {}\r\n", media_type).as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(part.data());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"--");
    out.extend_from_slice(boundary.as_bytes());
    out.extend_from_slice(b"--\r\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_is_alphanumeric_and_long() {
        let b = random_boundary();
        assert_eq!(b.len(), 30);
        assert!(b.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn encode_single_data_part() {
        let parts = vec![FormPart::new("field", "value", "")];
        let body = encode_multipart(&parts, "BOUND");
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("--BOUND\r\n"));
        assert!(text.contains("Content-Disposition: form-data; name=\"field\"\r\n\r\nvalue\r\n"));
        assert!(text.ends_with("--BOUND--\r\n"));
    }

    #[test]
    fn part_with_media_type_gets_content_type_line() {
        let parts = vec![FormPart::new("doc", "{}", "application/json")];
        let text = String::from_utf8(encode_multipart(&parts, "B")).unwrap();
        assert!(text.contains("Content-Type: application/json\r\n"));
    }

    #[test]
    fn file_part_reads_data_and_infers_type() {
        let dir = std::env::temp_dir();
        let path = dir.join("corriere_form_test.json");
        fs::write(&path, b"{\"a\":1}").unwrap();
        let part = FormPart::file("upload", &path, "").unwrap();
        assert_eq!(part.file_name(), Some("corriere_form_test.json"));
        assert_eq!(part.media_type(), Some("application/json"));
        assert_eq!(part.data(), b"{\"a\":1}");
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_file_is_a_file_error() {
        let e = FormPart::file("f", Path::new("/nonexistent/corriere"), "").unwrap_err();
        assert_eq!(e.kind(), ErrorKind::File);
    }
}

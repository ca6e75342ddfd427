/*
 * lib.rs
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

//! Corriere client core: blocking HTTP/1.1 client over an async dispatch
//! runtime. Build requests with `RequestBuilder`, send them through a
//! `ClientSession` (keep-alive connection cache) or drive a single
//! connection directly with `Client`.

pub mod builder;
pub mod client;
pub mod error;
pub mod form;
pub mod gzip;
pub mod parser;
pub mod request;
pub mod response;
pub mod session;
pub mod transport;
pub mod url;

pub use builder::RequestBuilder;
pub use client::{Client, CloseHandle, ProgressCallback};
pub use error::{Error, ErrorKind};
pub use form::FormPart;
pub use request::{Body, Method, Request};
pub use response::{Response, ResponseBody};
pub use session::{ClientSession, SessionCanceller};
pub use url::Url;

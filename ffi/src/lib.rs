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

//! C FFI for corriere core. Sessions are identified by opaque non-zero ids.
//! All string parameters are UTF-8 NUL-terminated. Strings returned to the
//! caller are owned and freed with corriere_free_string; responses with
//! corriere_response_free.

use libc::{c_char, c_int, size_t};
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use corriere_core::{ClientSession, Method, RequestBuilder, SessionCanceller};

/// Registry of sessions keyed by opaque id. The canceller is kept outside the
/// session mutex so a cancel never blocks behind an in-flight send.
struct Registry {
    sessions: RwLock<HashMap<u64, Arc<SessionHolder>>>,
    counter: AtomicU64,
}

struct SessionHolder {
    session: Mutex<ClientSession>,
    canceller: SessionCanceller,
}

fn registry() -> &'static Registry {
    static REGISTRY: once_cell::sync::OnceCell<Registry> = once_cell::sync::OnceCell::new();
    REGISTRY.get_or_init(|| Registry {
        sessions: RwLock::new(HashMap::new()),
        counter: AtomicU64::new(1),
    })
}

fn lookup(id: u64) -> Option<Arc<SessionHolder>> {
    registry()
        .sessions
        .read()
        .ok()
        .and_then(|map| map.get(&id).cloned())
}

fn ptr_to_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string()) }
}

thread_local! {
    static LAST_ERROR: std::cell::RefCell<Option<CString>> = std::cell::RefCell::new(None);
}

fn set_last_error(message: &str) {
    let msg = CString::new(message).unwrap_or_else(|_| CString::new("(error)").unwrap());
    LAST_ERROR.with(|e| *e.borrow_mut() = Some(msg));
}

fn clear_last_error() {
    LAST_ERROR.with(|e| *e.borrow_mut() = None);
}

fn owned_c_string(s: &str) -> *mut c_char {
    CString::new(s)
        .unwrap_or_else(|_| CString::new("").unwrap())
        .into_raw()
}

/// Response returned by corriere_session_send. Header names and values are
/// parallel arrays of length header_count. body is empty when the body was
/// streamed to file_path. Free with corriere_response_free.
#[repr(C)]
pub struct CorriereResponse {
    pub status: u16,
    pub reason: *mut c_char,
    pub header_count: size_t,
    pub header_names: *mut *mut c_char,
    pub header_values: *mut *mut c_char,
    pub body: *mut u8,
    pub body_len: size_t,
    pub file_path: *mut c_char,
}

/// Version string (static, do not free).
#[no_mangle]
pub extern "C" fn corriere_version() -> *const c_char {
    b"0.1.0\0".as_ptr() as *const c_char
}

/// Last error message from a failed call. Valid until the next FFI call on
/// this thread. Do not free.
#[no_mangle]
pub extern "C" fn corriere_last_error() -> *const c_char {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map(|s| s.as_ptr())
            .unwrap_or(ptr::null())
    })
}

/// Free a string returned by this library. No-op if ptr is NULL.
#[no_mangle]
pub unsafe extern "C" fn corriere_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        let _ = CString::from_raw(ptr);
    }
}

/// Create a session. Returns a non-zero id, or 0 on error.
#[no_mangle]
pub extern "C" fn corriere_session_new() -> u64 {
    let session = match ClientSession::new() {
        Ok(s) => s,
        Err(e) => {
            set_last_error(&e.to_string());
            return 0;
        }
    };
    let canceller = session.canceller();
    let holder = Arc::new(SessionHolder {
        session: Mutex::new(session),
        canceller,
    });
    let id = registry().counter.fetch_add(1, Ordering::SeqCst);
    if let Ok(mut map) = registry().sessions.write() {
        map.insert(id, holder);
        clear_last_error();
        id
    } else {
        set_last_error("registry poisoned");
        0
    }
}

/// Release a session. Cancels any in-flight send first.
#[no_mangle]
pub extern "C" fn corriere_session_free(id: u64) {
    let holder = {
        match registry().sessions.write() {
            Ok(mut map) => map.remove(&id),
            Err(_) => None,
        }
    };
    if let Some(holder) = holder {
        holder.canceller.cancel();
    }
}

fn with_session<F: FnOnce(&mut ClientSession)>(id: u64, f: F) -> c_int {
    let holder = match lookup(id) {
        Some(h) => h,
        None => {
            set_last_error("session not found");
            return -1;
        }
    };
    let rc = match holder.session.lock() {
        Ok(mut session) => {
            f(&mut session);
            clear_last_error();
            0
        }
        Err(_) => {
            set_last_error("session poisoned");
            -1
        }
    };
    rc
}

/// Connect timeout in seconds; 0 disables it. Returns 0 on success.
#[no_mangle]
pub extern "C" fn corriere_session_set_connect_timeout(id: u64, seconds: u64) -> c_int {
    with_session(id, |s| s.set_connect_timeout(seconds))
}

/// Read timeout in seconds; 0 keeps the default. Returns 0 on success.
#[no_mangle]
pub extern "C" fn corriere_session_set_read_timeout(id: u64, seconds: u64) -> c_int {
    with_session(id, |s| s.set_read_timeout(seconds))
}

/// Read buffer size in bytes; 0 keeps the default. Returns 0 on success.
#[no_mangle]
pub extern "C" fn corriere_session_set_buffer_size(id: u64, size: size_t) -> c_int {
    with_session(id, |s| s.set_buffer_size(size))
}

/// Set a session default header, replacing any previous value.
#[no_mangle]
pub extern "C" fn corriere_session_set_header(
    id: u64,
    key: *const c_char,
    value: *const c_char,
) -> c_int {
    let (key, value) = match (ptr_to_str(key), ptr_to_str(value)) {
        (Some(k), Some(v)) => (k, v),
        _ => {
            set_last_error("key or value is null or not valid UTF-8");
            return -1;
        }
    };
    with_session(id, |s| s.set_header(&key, &value))
}

/// Basic authorization for all requests on this session.
#[no_mangle]
pub extern "C" fn corriere_session_set_auth_basic(
    id: u64,
    login: *const c_char,
    password: *const c_char,
) -> c_int {
    let (login, password) = match (ptr_to_str(login), ptr_to_str(password)) {
        (Some(l), Some(p)) => (l, p),
        _ => {
            set_last_error("login or password is null or not valid UTF-8");
            return -1;
        }
    };
    with_session(id, |s| s.set_auth_basic(&login, &password))
}

/// Token authorization for all requests on this session.
#[no_mangle]
pub extern "C" fn corriere_session_set_auth_token(id: u64, token: *const c_char) -> c_int {
    let token = match ptr_to_str(token) {
        Some(t) => t,
        None => {
            set_last_error("token is null or not valid UTF-8");
            return -1;
        }
    };
    with_session(id, |s| s.set_auth_token(&token))
}

/// Accept gzip-compressed response bodies (nonzero) or identity only (0).
#[no_mangle]
pub extern "C" fn corriere_session_set_accept_gzip(id: u64, gzip: c_int) -> c_int {
    with_session(id, |s| s.set_accept_gzip(gzip != 0))
}

/// Cancel the in-flight send, if any. Safe from any thread; the blocked
/// corriere_session_send call returns with an error.
#[no_mangle]
pub extern "C" fn corriere_session_cancel(id: u64) -> c_int {
    match lookup(id) {
        Some(holder) => {
            holder.canceller.cancel();
            clear_last_error();
            0
        }
        None => {
            set_last_error("session not found");
            -1
        }
    }
}

fn parse_method(s: &str) -> Option<Method> {
    match s.to_ascii_uppercase().as_str() {
        "GET" => Some(Method::Get),
        "HEAD" => Some(Method::Head),
        "POST" => Some(Method::Post),
        "PUT" => Some(Method::Put),
        "DELETE" => Some(Method::Delete),
        "PATCH" => Some(Method::Patch),
        _ => None,
    }
}

fn string_array(values: Vec<String>) -> *mut *mut c_char {
    let ptrs: Vec<*mut c_char> = values.iter().map(|v| owned_c_string(v)).collect();
    // Boxed slice so length and capacity are equal when reconstructed in free.
    Box::into_raw(ptrs.into_boxed_slice()) as *mut *mut c_char
}

/// Perform a blocking request. method: "GET", "POST", etc. body may be NULL
/// (body_len 0). media_type sets the Content-Type header when non-NULL.
/// With stream nonzero the response body goes to a temporary file whose path
/// is in the returned file_path; the caller owns that file. Returns NULL on
/// error with the message in corriere_last_error.
#[no_mangle]
pub extern "C" fn corriere_session_send(
    id: u64,
    method: *const c_char,
    url: *const c_char,
    body: *const u8,
    body_len: size_t,
    media_type: *const c_char,
    stream: c_int,
) -> *mut CorriereResponse {
    let method = match ptr_to_str(method).as_deref().and_then(parse_method) {
        Some(m) => m,
        None => {
            set_last_error("invalid method");
            return ptr::null_mut();
        }
    };
    let url = match ptr_to_str(url) {
        Some(u) => u,
        None => {
            set_last_error("url is null or not valid UTF-8");
            return ptr::null_mut();
        }
    };
    let holder = match lookup(id) {
        Some(h) => h,
        None => {
            set_last_error("session not found");
            return ptr::null_mut();
        }
    };

    let mut builder = RequestBuilder::new().method(method).url(&url, false);
    if body_len > 0 {
        if body.is_null() {
            set_last_error("body is null with nonzero length");
            return ptr::null_mut();
        }
        let data = unsafe { std::slice::from_raw_parts(body, body_len) };
        builder = builder.body(data.to_vec());
    }
    if let Some(mt) = ptr_to_str(media_type) {
        if !mt.is_empty() {
            builder = builder.media_type(&mt);
        }
    }
    let request = match builder.build() {
        Ok(r) => r,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let result = match holder.session.lock() {
        Ok(mut session) => session.send_with(request, stream != 0, None),
        Err(_) => {
            set_last_error("session poisoned");
            return ptr::null_mut();
        }
    };
    let response = match result {
        Ok(r) => r,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let (names, values): (Vec<String>, Vec<String>) =
        response.headers().iter().cloned().unzip();
    let header_count = names.len();
    let body_bytes = response.data().to_vec().into_boxed_slice();
    let body_len = body_bytes.len();
    let body_ptr = Box::into_raw(body_bytes) as *mut u8;
    let file_path = match response.file_path() {
        Some(path) => owned_c_string(&path.to_string_lossy()),
        None => ptr::null_mut(),
    };

    clear_last_error();
    Box::into_raw(Box::new(CorriereResponse {
        status: response.status(),
        reason: owned_c_string(response.reason()),
        header_count,
        header_names: string_array(names),
        header_values: string_array(values),
        body: body_ptr,
        body_len,
        file_path,
    }))
}

/// Free a response returned by corriere_session_send. No-op if NULL.
#[no_mangle]
pub unsafe extern "C" fn corriere_response_free(response: *mut CorriereResponse) {
    if response.is_null() {
        return;
    }
    let response = Box::from_raw(response);
    corriere_free_string(response.reason);
    for i in 0..response.header_count {
        corriere_free_string(*response.header_names.add(i));
        corriere_free_string(*response.header_values.add(i));
    }
    if !response.header_names.is_null() {
        let _ = Vec::from_raw_parts(
            response.header_names,
            response.header_count,
            response.header_count,
        );
        let _ = Vec::from_raw_parts(
            response.header_values,
            response.header_count,
            response.header_count,
        );
    }
    if !response.body.is_null() {
        let _ = Vec::from_raw_parts(response.body, response.body_len, response.body_len);
    }
    corriere_free_string(response.file_path);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    fn c(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    #[test]
    fn send_and_free_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = std::thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            while !received.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).unwrap();
                received.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello")
                .unwrap();
        });

        let id = corriere_session_new();
        assert_ne!(id, 0);
        let method = c("GET");
        let url = c(&format!("http://127.0.0.1:{}/", port));
        let response = corriere_session_send(
            id,
            method.as_ptr(),
            url.as_ptr(),
            ptr::null(),
            0,
            ptr::null(),
            0,
        );
        assert!(!response.is_null());
        unsafe {
            assert_eq!((*response).status, 200);
            let body = std::slice::from_raw_parts((*response).body, (*response).body_len);
            assert_eq!(body, b"hello");
            assert!((*response).header_count >= 1);
            corriere_response_free(response);
        }
        corriere_session_free(id);
        server.join().unwrap();
    }

    #[test]
    fn errors_are_reported() {
        let response = corriere_session_send(
            0,
            c("GET").as_ptr(),
            c("http://127.0.0.1/").as_ptr(),
            ptr::null(),
            0,
            ptr::null(),
            0,
        );
        assert!(response.is_null());
        let err = corriere_last_error();
        assert!(!err.is_null());
    }
}

//! Host-agnostic request and response types.
//!
//! Adapters translate a host-native request into a [`GateRequest`], hand it
//! to [`crate::Gate::handle`], and either forward the original request to the
//! application ([`GateOutcome::Passthrough`]) or render the returned
//! [`GateResponse`]. Every adapter shares one gate implementation this way.

use std::collections::HashMap;

use bytes::Bytes;
use http::header::{HeaderMap, HeaderValue};
use http::{Method, StatusCode};
use percent_encoding::percent_decode_str;

/// What the gate decided to do with a request.
#[derive(Debug)]
pub enum GateOutcome {
    /// Defer to the host: the underlying application serves the request.
    Passthrough,
    /// Send this response instead of invoking the application.
    Respond(GateResponse),
}

/// The gate's view of an incoming request.
#[derive(Debug, Clone)]
pub struct GateRequest {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    client_ip: String,
    body: Bytes,
}

impl GateRequest {
    /// A request with the given method and path, no headers, no body, and an
    /// unknown client address.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            client_ip: "unknown".to_string(),
            body: Bytes::new(),
        }
    }

    /// Attach the raw query string (without the `?`).
    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = query;
        self
    }

    /// Attach request headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Attach the client IP as reported by the host.
    pub fn with_client_ip(mut self, client_ip: impl Into<String>) -> Self {
        self.client_ip = client_ip.into();
        self
    }

    /// Attach the request body. Only read for challenge verification.
    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn client_ip(&self) -> &str {
        &self.client_ip
    }

    /// Path plus query string, the way a browser would re-request it.
    pub fn full_path(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{query}", self.path),
            None => self.path.clone(),
        }
    }

    /// First value of `name`, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Whether the header is present at all, regardless of its value.
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    /// Value of the named cookie, parsed leniently from every `Cookie`
    /// header: entries split on `;`, whitespace trimmed, first match wins.
    pub fn cookie(&self, name: &str) -> Option<String> {
        for header in self.headers.get_all(http::header::COOKIE) {
            let Ok(raw) = header.to_str() else { continue };
            for entry in raw.split(';') {
                if let Some((k, v)) = entry.split_once('=') {
                    if k.trim() == name {
                        return Some(v.trim().to_string());
                    }
                }
            }
        }
        None
    }

    /// Decode the body as `application/x-www-form-urlencoded`. Undecodable
    /// bodies yield an empty map; duplicate fields keep the last value.
    pub fn form(&self) -> HashMap<String, String> {
        let mut fields = HashMap::new();
        let Ok(text) = std::str::from_utf8(&self.body) else {
            return fields;
        };
        for pair in text.split('&') {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            fields.insert(decode_component(key), decode_component(value));
        }
        fields
    }
}

fn decode_component(raw: &str) -> String {
    let unplussed = raw.replace('+', " ");
    percent_decode_str(&unplussed).decode_utf8_lossy().into_owned()
}

/// A response produced by the gate, expressed in `http` vocabulary so any
/// host can render it.
#[derive(Debug)]
pub struct GateResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl GateResponse {
    /// JSON response with a pretty-printed body.
    pub fn json(status: StatusCode, body: &serde_json::Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        let body = serde_json::to_string_pretty(body).unwrap_or_else(|_| "{}".to_string());
        Self { status, headers, body }
    }

    /// The challenge page: 200, HTML, never cached.
    pub fn challenge_page(html: String) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        headers.insert(
            http::header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        );
        Self {
            status: StatusCode::OK,
            headers,
            body: html,
        }
    }

    /// A 302 redirect carrying a `Set-Cookie` header. Falls back to `/` if
    /// the location does not fit in a header value.
    pub fn redirect_with_cookie(location: &str, set_cookie: &str) -> Self {
        let mut headers = HeaderMap::new();
        let location = HeaderValue::from_str(location)
            .unwrap_or_else(|_| HeaderValue::from_static("/"));
        headers.insert(http::header::LOCATION, location);
        if let Ok(cookie) = HeaderValue::from_str(set_cookie) {
            headers.insert(http::header::SET_COOKIE, cookie);
        }
        Self {
            status: StatusCode::FOUND,
            headers,
            body: String::new(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Decompose into status, headers and body for rendering.
    pub fn into_parts(self) -> (StatusCode, HeaderMap, String) {
        (self.status, self.headers, self.body)
    }
}

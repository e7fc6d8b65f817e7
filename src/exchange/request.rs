use std::sync::Arc;

use http::Method;
use smallvec::SmallVec;

use crate::ids::RequestId;

/// Maximum inline headers/cookies before heap allocation
/// Most requests have ≤16 headers
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header/cookie storage for the per-request hot path
///
/// Header names use `Arc<str>` because they repeat across requests
/// (`origin`, `cookie`, `authorization`); values are per-request data.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// An inbound HTTP request as seen by the security pipeline
///
/// The host server parses the wire request and hands the pipeline this value.
/// Cookies are split out of the `Cookie` header once, when the header is added.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Unique request ID for tracing and correlation
    pub request_id: RequestId,
    /// HTTP method (GET, POST, etc.)
    pub method: Method,
    /// Request path, without the query string
    pub path: String,
    /// Raw query string, without the leading `?`
    pub query: Option<String>,
    /// HTTP headers
    pub headers: HeaderVec,
    /// Cookies parsed from the `Cookie` header
    pub cookies: HeaderVec,
    /// Raw request body (form submissions carry credentials here)
    pub body: Option<String>,
}

impl HttpRequest {
    /// Build a request for `target`; anything after a `?` becomes [`HttpRequest::query`]
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        let mut path = target.into();
        let query = path.find('?').map(|at| {
            let query = path[at + 1..].to_string();
            path.truncate(at);
            query
        });
        Self {
            request_id: RequestId::new(),
            method,
            path,
            query,
            headers: HeaderVec::new(),
            cookies: HeaderVec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Add a header. A `cookie` header is also split into [`HttpRequest::cookies`].
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        if name.eq_ignore_ascii_case("cookie") {
            parse_cookie_header(&value, &mut self.cookies);
        }
        if name.eq_ignore_ascii_case("x-request-id") {
            self.request_id = RequestId::from_header_or_new(Some(&value));
        }
        self.headers.push((Arc::from(name.to_ascii_lowercase()), value));
        self
    }

    pub fn with_cookie(mut self, name: &str, value: impl Into<String>) -> Self {
        self.cookies.push((Arc::from(name), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get a cookie by name
    #[inline]
    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    pub fn origin(&self) -> Option<&str> {
        self.get_header("origin")
    }

    /// A CORS preflight is an `OPTIONS` request carrying both `Origin` and
    /// `Access-Control-Request-Method`.
    pub fn is_preflight(&self) -> bool {
        self.method == Method::OPTIONS
            && self.origin().is_some()
            && self.get_header("access-control-request-method").is_some()
    }
}

fn parse_cookie_header(value: &str, cookies: &mut HeaderVec) {
    for pair in value.split(';') {
        if let Some((name, val)) = pair.split_once('=') {
            let name = name.trim();
            if !name.is_empty() {
                cookies.push((Arc::from(name), val.trim().to_string()));
            }
        }
    }
}

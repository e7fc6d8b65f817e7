use std::sync::Arc;

use serde_json::Value;

use super::request::HeaderVec;

/// Response produced by a handler or by a stage that short-circuits the chain
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code (200, 401, 403, ...)
    pub status: u16,
    /// HTTP response headers
    pub headers: HeaderVec,
    /// Response body as JSON
    pub body: Value,
}

impl HttpResponse {
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: Value) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Status-only response with no headers and a null body
    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self::new(status, HeaderVec::new(), Value::Null)
    }

    /// Create a JSON response with a content type
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "application/json".to_string()));
        Self::new(status, headers, body)
    }

    /// Create an error response with `{ "error": message }`
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, serde_json::json!({ "error": message }))
    }

    /// `302 Found` pointing at `location`
    #[must_use]
    pub fn redirect(location: &str) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("location"), location.to_string()));
        Self::new(302, headers, Value::Null)
    }

    /// Get a header by name
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values of a repeatable header such as `set-cookie`
    pub fn get_all_headers<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    pub fn has_header(&self, name: &str) -> bool {
        self.get_header(name).is_some()
    }

    /// Add or replace a header
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }

    /// Add `token` to the `Vary` header unless it is already listed
    ///
    /// Values set by the handler are kept. `Vary: *` already covers everything.
    pub fn add_vary(&mut self, token: &str) {
        let listed = self
            .get_all_headers("vary")
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .any(|t| t == "*" || t.eq_ignore_ascii_case(token));
        if listed {
            return;
        }
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case("vary"))
        {
            Some((_, value)) if !value.trim().is_empty() => {
                value.push_str(", ");
                value.push_str(token);
            }
            Some((_, value)) => *value = token.to_string(),
            None => self.headers.push((Arc::from("vary"), token.to_string())),
        }
    }

    /// Append a header without removing existing values
    pub fn append_header(&mut self, name: Arc<str>, value: String) {
        self.headers.push((name, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_vary_merges_with_existing_value() {
        let mut res = HttpResponse::empty(200);
        res.set_header("Vary", "Accept-Encoding".to_string());
        res.add_vary("Origin");
        assert_eq!(res.get_header("vary"), Some("Accept-Encoding, Origin"));
        assert_eq!(res.get_all_headers("vary").count(), 1);

        res.add_vary("origin");
        assert_eq!(res.get_header("vary"), Some("Accept-Encoding, Origin"));
    }

    #[test]
    fn test_add_vary_without_existing_value() {
        let mut res = HttpResponse::empty(200);
        res.add_vary("Origin");
        assert_eq!(res.get_header("vary"), Some("Origin"));

        let mut any = HttpResponse::empty(200);
        any.set_header("vary", "*".to_string());
        any.add_vary("Origin");
        assert_eq!(any.get_header("vary"), Some("*"));
    }
}

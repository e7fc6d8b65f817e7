use std::fmt;
use std::sync::Arc;

use http::Method;
use tracing::{debug, warn};

use super::configuration::CorsConfiguration;
use super::source::CorsConfigurationSource;
use crate::exchange::{HeaderVec, HttpRequest};

/// Why a cross-origin request was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The origin is not allowed
    Origin,
    /// The (requested) method is not allowed
    Method,
    /// A requested header is not allowed
    Headers,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::Origin => write!(f, "origin not allowed"),
            DenyReason::Method => write!(f, "method not allowed"),
            DenyReason::Headers => write!(f, "headers not allowed"),
        }
    }
}

/// Outcome of CORS evaluation for one request
///
/// Denial is a decision, not an error: the CORS stage decides what a denial
/// means for the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsDecision {
    /// No `Origin`, or same origin; no CORS headers
    NotCors,
    /// Cross-origin, but no configuration covers this URL
    NoPolicy,
    /// Allowed; `headers` go on the response
    Allow { headers: HeaderVec, preflight: bool },
    /// Denied; no CORS headers
    Deny { reason: DenyReason, preflight: bool },
}

impl CorsDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, CorsDecision::Allow { .. })
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, CorsDecision::Deny { .. })
    }

    /// Response headers for an allowed request; empty otherwise
    pub fn headers(&self) -> &[(Arc<str>, String)] {
        match self {
            CorsDecision::Allow { headers, .. } => headers.as_slice(),
            _ => &[],
        }
    }
}

/// Decides allow/deny for cross-origin requests against a configuration source
///
/// Holds no mutable state; the same inputs always produce the same decision.
#[derive(Clone)]
pub struct CorsPolicyResolver {
    source: Arc<dyn CorsConfigurationSource>,
}

impl CorsPolicyResolver {
    pub fn new(source: Arc<dyn CorsConfigurationSource>) -> Self {
        Self { source }
    }

    /// Decide for an actual (non-preflight) request
    pub fn resolve(&self, origin: Option<&str>, method: &Method, path: &str) -> CorsDecision {
        let Some(origin) = origin else {
            return CorsDecision::NotCors;
        };
        let Some(config) = self.source.configuration_for(method, path) else {
            debug!(origin, path, "CORS: no configuration for path");
            return CorsDecision::NoPolicy;
        };
        let Some(allow_origin) = config.check_origin(origin) else {
            warn!(origin, path, "CORS: invalid origin");
            return deny(DenyReason::Origin, false);
        };
        if !config.check_method(method) {
            warn!(origin, method = %method, path, "CORS: method not allowed");
            return deny(DenyReason::Method, false);
        }
        let mut headers = HeaderVec::new();
        common_headers(&config, allow_origin, &mut headers);
        if !config.expose_headers.is_empty() {
            headers.push((
                Arc::from("access-control-expose-headers"),
                config.expose_headers.join(", "),
            ));
        }
        CorsDecision::Allow {
            headers,
            preflight: false,
        }
    }

    /// Decide for a request, handling preflight and same-origin detection
    pub fn resolve_request(&self, request: &HttpRequest) -> CorsDecision {
        let Some(origin) = request.origin() else {
            return CorsDecision::NotCors;
        };
        if is_same_origin(request, origin) {
            debug!(origin, "CORS: same-origin request, skipping CORS headers");
            return CorsDecision::NotCors;
        }
        if request.is_preflight() {
            self.resolve_preflight(request, origin)
        } else {
            self.resolve(Some(origin), &request.method, &request.path)
        }
    }

    fn resolve_preflight(&self, request: &HttpRequest, origin: &str) -> CorsDecision {
        let requested = request
            .get_header("access-control-request-method")
            .unwrap_or_default();
        let Ok(requested_method) = Method::from_bytes(requested.as_bytes()) else {
            warn!(requested, "CORS preflight: invalid Access-Control-Request-Method");
            return deny(DenyReason::Method, true);
        };
        let Some(config) = self.source.configuration_for(&requested_method, &request.path) else {
            debug!(origin, path = %request.path, "CORS preflight: no configuration for path");
            return CorsDecision::NoPolicy;
        };
        let Some(allow_origin) = config.check_origin(origin) else {
            warn!(origin, "CORS preflight: invalid origin");
            return deny(DenyReason::Origin, true);
        };
        if !config.check_method(&requested_method) {
            warn!(method = %requested_method, "CORS preflight: method not in allowed methods");
            return deny(DenyReason::Method, true);
        }
        let requested_headers = request.get_header("access-control-request-headers");
        if let Some(rejected) = requested_headers.and_then(|h| config.first_rejected_header(h)) {
            warn!(header = rejected, "CORS preflight: header not in allowed headers");
            return deny(DenyReason::Headers, true);
        }

        let mut headers = HeaderVec::new();
        common_headers(&config, allow_origin, &mut headers);
        headers.push((
            Arc::from("access-control-allow-methods"),
            config
                .allowed_methods
                .iter()
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        ));
        // `*` is echoed as the requested list so credentialed preflights work too
        let allow_headers = if config.allowed_headers.iter().any(|h| h == "*") {
            requested_headers.unwrap_or("*").to_string()
        } else {
            config.allowed_headers.join(", ")
        };
        if !allow_headers.is_empty() {
            headers.push((Arc::from("access-control-allow-headers"), allow_headers));
        }
        if let Some(age) = config.max_age {
            headers.push((Arc::from("access-control-max-age"), age.to_string()));
        }
        CorsDecision::Allow {
            headers,
            preflight: true,
        }
    }
}

impl fmt::Debug for CorsPolicyResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorsPolicyResolver").finish_non_exhaustive()
    }
}

fn deny(reason: DenyReason, preflight: bool) -> CorsDecision {
    CorsDecision::Deny { reason, preflight }
}

fn common_headers(config: &CorsConfiguration, allow_origin: String, headers: &mut HeaderVec) {
    let wildcard = allow_origin == "*";
    headers.push((Arc::from("access-control-allow-origin"), allow_origin));
    if config.allow_credentials {
        headers.push((
            Arc::from("access-control-allow-credentials"),
            "true".to_string(),
        ));
    }
    if !wildcard {
        headers.push((Arc::from("vary"), "Origin".to_string()));
    }
}

/// Same-origin when the `Origin` authority equals the `Host` header
fn is_same_origin(request: &HttpRequest, origin: &str) -> bool {
    let Some(host) = request.get_header("host") else {
        return false;
    };
    let Ok(parsed) = url::Url::parse(origin) else {
        return false;
    };
    let Some(origin_host) = parsed.host_str() else {
        return false;
    };
    let origin_authority = match parsed.port() {
        Some(port) => format!("{origin_host}:{port}"),
        None => origin_host.to_string(),
    };
    host.eq_ignore_ascii_case(&origin_authority)
        || (parsed.port().is_none()
            && parsed
                .port_or_known_default()
                .is_some_and(|p| host.eq_ignore_ascii_case(&format!("{origin_host}:{p}"))))
}

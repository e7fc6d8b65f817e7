use serde::Deserialize;
use tracing::{debug, warn};

use super::resolver::{CorsDecision, CorsPolicyResolver};
use crate::exchange::{Exchange, HttpResponse};
use crate::filter::{Filter, FilterError, Next};

/// What a denied actual (non-preflight) request gets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorsRejectPolicy {
    /// Let the request through without CORS headers; the browser blocks the read
    #[default]
    PassThrough,
    /// Answer `403 Forbidden` without running downstream stages
    Forbid,
}

/// CORS stage
///
/// Runs before the security-context stage, so a preflight is answered
/// without loading or touching any security state.
///
/// - allowed preflight: `200` with the CORS headers, chain short-circuits
/// - denied preflight: `403`, chain short-circuits
/// - allowed actual request: downstream runs, CORS headers are added to
///   whatever response comes back
/// - denied actual request: per [`CorsRejectPolicy`]
pub struct CorsFilter {
    resolver: CorsPolicyResolver,
    reject_policy: CorsRejectPolicy,
}

impl CorsFilter {
    pub const NAME: &'static str = "cors";

    pub fn new(resolver: CorsPolicyResolver) -> Self {
        Self {
            resolver,
            reject_policy: CorsRejectPolicy::default(),
        }
    }

    pub fn with_reject_policy(mut self, policy: CorsRejectPolicy) -> Self {
        self.reject_policy = policy;
        self
    }

    pub fn resolver(&self) -> &CorsPolicyResolver {
        &self.resolver
    }
}

impl Filter for CorsFilter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn filter(&self, exchange: &mut Exchange, next: Next<'_>) -> Result<HttpResponse, FilterError> {
        let decision = self.resolver.resolve_request(exchange.request());
        exchange.set_cors_decision(decision.clone());

        match decision {
            CorsDecision::NotCors | CorsDecision::NoPolicy => next.run(exchange),
            CorsDecision::Allow {
                headers,
                preflight: true,
            } => {
                debug!(path = %exchange.request().path, "CORS preflight allowed");
                Ok(HttpResponse::new(200, headers, serde_json::Value::Null))
            }
            CorsDecision::Deny {
                reason,
                preflight: true,
            } => {
                warn!(path = %exchange.request().path, %reason, "CORS preflight rejected");
                Ok(HttpResponse::error(403, "Invalid CORS request"))
            }
            CorsDecision::Allow {
                headers,
                preflight: false,
            } => {
                let mut response = next.run(exchange)?;
                for (name, value) in headers {
                    if name.eq_ignore_ascii_case("vary") {
                        response.add_vary(&value);
                    } else {
                        response.set_header(&name, value);
                    }
                }
                Ok(response)
            }
            CorsDecision::Deny {
                reason,
                preflight: false,
            } => match self.reject_policy {
                CorsRejectPolicy::PassThrough => {
                    debug!(%reason, "CORS request denied, passing through without headers");
                    next.run(exchange)
                }
                CorsRejectPolicy::Forbid => {
                    warn!(path = %exchange.request().path, %reason, "CORS request rejected");
                    Ok(HttpResponse::error(403, "Invalid CORS request"))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use http::Method;

    use super::*;
    use crate::cors::{CorsConfiguration, UrlBasedCorsConfigurationSource};
    use crate::exchange::HttpRequest;
    use crate::filter::handler_fn;

    fn stage(policy: CorsRejectPolicy) -> Vec<Arc<dyn Filter>> {
        let source = UrlBasedCorsConfigurationSource::new()
            .with(
                "/**",
                CorsConfiguration::builder()
                    .allowed_origins(&["https://app.com"])
                    .allowed_methods(&[Method::GET, Method::POST])
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let resolver = CorsPolicyResolver::new(Arc::new(source));
        vec![Arc::new(CorsFilter::new(resolver).with_reject_policy(policy))]
    }

    /// Run one request; the flag tells whether the handler was reached
    fn run(filters: &[Arc<dyn Filter>], req: HttpRequest) -> (HttpResponse, bool) {
        let handler = handler_fn(|_: &mut Exchange| {
            let mut res = HttpResponse::empty(200);
            res.set_header("x-handler", "1".to_string());
            Ok(res)
        });
        let mut ex = Exchange::new(req, "SESSION");
        let res = Next::new(filters, &handler).run(&mut ex).unwrap();
        let reached = res.has_header("x-handler");
        (res, reached)
    }

    #[test]
    fn test_allowed_request_gets_headers() {
        let (res, reached) = run(
            &stage(CorsRejectPolicy::PassThrough),
            HttpRequest::get("/x").with_header("Origin", "https://app.com"),
        );
        assert!(reached);
        assert_eq!(res.get_header("access-control-allow-origin"), Some("https://app.com"));
    }

    #[test]
    fn test_preflight_short_circuits() {
        let req = HttpRequest::new(Method::OPTIONS, "/x")
            .with_header("Origin", "https://app.com")
            .with_header("Access-Control-Request-Method", "POST");
        let (res, reached) = run(&stage(CorsRejectPolicy::PassThrough), req);
        assert!(!reached);
        assert_eq!(res.status, 200);
        assert_eq!(res.get_header("access-control-allow-methods"), Some("GET, POST"));

        let denied = HttpRequest::new(Method::OPTIONS, "/x")
            .with_header("Origin", "https://evil.com")
            .with_header("Access-Control-Request-Method", "POST");
        let (res, _) = run(&stage(CorsRejectPolicy::PassThrough), denied);
        assert_eq!(res.status, 403);
        assert!(!res.has_header("access-control-allow-origin"));
    }

    #[test]
    fn test_reject_policies() {
        let req = || HttpRequest::get("/x").with_header("Origin", "https://evil.com");
        let (res, reached) = run(&stage(CorsRejectPolicy::PassThrough), req());
        assert_eq!(res.status, 200);
        assert!(reached);
        assert!(!res.has_header("access-control-allow-origin"));

        let (res, reached) = run(&stage(CorsRejectPolicy::Forbid), req());
        assert!(!reached);
        assert_eq!(res.status, 403);
    }
}

use std::time::Instant;

use tracing::{field, info_span};

use super::core::{Filter, FilterError, Next};
use crate::exchange::{Exchange, HttpResponse};

/// Wraps the rest of the chain in a `request` span
///
/// The span carries the request id, method and path, and records status and
/// latency once the response is known.
#[derive(Debug, Default)]
pub struct TracingFilter;

impl TracingFilter {
    pub const NAME: &'static str = "tracing";
}

impl Filter for TracingFilter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn filter(&self, exchange: &mut Exchange, next: Next<'_>) -> Result<HttpResponse, FilterError> {
        let request = exchange.request();
        let span = info_span!(
            "request",
            request_id = %request.request_id,
            method = %request.method,
            path = %request.path,
            status = field::Empty,
            latency_ms = field::Empty,
        );
        let start = Instant::now();
        let outcome = span.in_scope(|| next.run(exchange));
        span.record("latency_ms", start.elapsed().as_millis() as u64);
        match &outcome {
            Ok(response) => {
                span.record("status", response.status);
            }
            Err(e) => span.in_scope(|| tracing::error!(error = %e, "request failed")),
        }
        outcome
    }
}

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use super::core::{Filter, FilterError, Next};
use crate::exchange::{Exchange, HttpResponse};

/// Stage collecting Prometheus-compatible counters
///
/// All counters use atomic operations for thread-safe updates without locks.
///
/// Metrics collected:
/// - Total request count
/// - Average latency
/// - Authentication failures (`401` responses and failed form logins)
/// - Access denials (`403` responses, including CORS rejections)
/// - Pipeline errors
pub struct MetricsFilter {
    request_count: AtomicUsize,
    total_latency_ns: AtomicU64,
    auth_failures: AtomicUsize,
    access_denied: AtomicUsize,
    errors: AtomicUsize,
}

impl Default for MetricsFilter {
    fn default() -> Self {
        Self {
            request_count: AtomicUsize::new(0),
            total_latency_ns: AtomicU64::new(0),
            auth_failures: AtomicUsize::new(0),
            access_denied: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        }
    }
}

impl MetricsFilter {
    pub const NAME: &'static str = "metrics";

    pub fn new() -> Self {
        Self::default()
    }

    /// Get the total number of requests processed
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Calculate the average request latency
    ///
    /// Returns zero duration if no requests have been processed yet.
    pub fn average_latency(&self) -> Duration {
        let count = self.request_count.load(Ordering::Relaxed) as u64;
        if count == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(self.total_latency_ns.load(Ordering::Relaxed) / count)
        }
    }

    pub fn auth_failures(&self) -> usize {
        self.auth_failures.load(Ordering::Relaxed)
    }

    pub fn access_denied(&self) -> usize {
        self.access_denied.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }

    /// Render counters in the Prometheus text exposition format
    pub fn render_prometheus(&self) -> String {
        let mut out = String::new();
        let avg = self.average_latency().as_secs_f64();
        let metrics: [(&str, &str, &str, String); 5] = [
            ("brrtguard_requests_total", "counter", "Requests handled by the pipeline", self.request_count().to_string()),
            ("brrtguard_auth_failures_total", "counter", "Failed authentication attempts", self.auth_failures().to_string()),
            ("brrtguard_access_denied_total", "counter", "Requests answered with 403", self.access_denied().to_string()),
            ("brrtguard_errors_total", "counter", "Requests aborted by a pipeline error", self.errors().to_string()),
            ("brrtguard_request_latency_seconds", "gauge", "Average request latency", format!("{avg:.6}")),
        ];
        for (name, kind, help, value) in metrics {
            out.push_str(&format!("# HELP {name} {help}\n# TYPE {name} {kind}\n{name} {value}\n"));
        }
        out
    }

    fn observe(&self, outcome: &Result<HttpResponse, FilterError>, latency: Duration) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ns
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
        match outcome {
            Ok(response) if response.status == 401 => {
                self.auth_failures.fetch_add(1, Ordering::Relaxed);
            }
            Ok(response)
                if response.status == 302
                    && response
                        .get_header("location")
                        .is_some_and(|l| l.contains("?error")) =>
            {
                self.auth_failures.fetch_add(1, Ordering::Relaxed);
            }
            Ok(response) if response.status == 403 => {
                self.access_denied.fetch_add(1, Ordering::Relaxed);
            }
            Ok(_) => {}
            Err(_) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl Filter for MetricsFilter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn filter(&self, exchange: &mut Exchange, next: Next<'_>) -> Result<HttpResponse, FilterError> {
        let start = Instant::now();
        let outcome = next.run(exchange);
        self.observe(&outcome, start.elapsed());
        outcome
    }
}

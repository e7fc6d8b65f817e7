use std::hint::black_box;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use brrtguard::chain::{FilterChainBuilder, FilterChainProxy, SharedContext};
use brrtguard::cors::{CorsConfiguration, UrlBasedCorsConfigurationSource};
use brrtguard::exchange::{Exchange, HttpRequest, HttpResponse};
use brrtguard::filter::{handler_fn, Access};
use brrtguard::security::{InMemoryUserDetailsManager, UserDetails};
use criterion::{criterion_group, criterion_main, Criterion};
use http::Method;

fn proxy(explicit_save: bool) -> FilterChainProxy {
    let cors = CorsConfiguration::builder()
        .allowed_origins(&["https://app.example.com"])
        .allow_credentials(true)
        .max_age(600)
        .build()
        .expect("cors configuration");
    let source = UrlBasedCorsConfigurationSource::new()
        .with("/api/**", cors)
        .expect("cors source");
    let users = InMemoryUserDetailsManager::new([UserDetails::new("user", "password", &["USER"])]);
    let shared = SharedContext::new()
        .with_cors_configuration_source(Arc::new(source))
        .with_user_details(Arc::new(users));

    let chain = FilterChainBuilder::new(shared)
        .cors(|c| c)
        .security_context(|c| c.require_explicit_save(explicit_save))
        .http_basic(|b| b)
        .authorize_requests(|a| {
            a.request_matchers("/api/public/**", Access::PermitAll)
                .any_request(Access::Authenticated)
        })
        .build()
        .expect("chain");
    FilterChainProxy::new(vec![chain])
}

fn bench_chain_throughput(c: &mut Criterion) {
    let handler = handler_fn(|_: &mut Exchange| Ok(HttpResponse::empty(200)));
    let basic = format!("Basic {}", STANDARD.encode("user:password"));

    for (label, explicit_save) in [("auto_save", false), ("explicit_save", true)] {
        let proxy = proxy(explicit_save);

        c.bench_function(&format!("preflight_{label}"), |b| {
            b.iter(|| {
                let request = HttpRequest::new(Method::OPTIONS, "/api/items")
                    .with_header("origin", "https://app.example.com")
                    .with_header("access-control-request-method", "POST");
                black_box(proxy.serve(request, &handler));
            })
        });

        c.bench_function(&format!("anonymous_public_{label}"), |b| {
            b.iter(|| {
                let request = HttpRequest::get("/api/public/status")
                    .with_header("origin", "https://app.example.com");
                black_box(proxy.serve(request, &handler));
            })
        });

        c.bench_function(&format!("basic_authenticated_{label}"), |b| {
            b.iter(|| {
                let request = HttpRequest::get("/api/items")
                    .with_header("origin", "https://app.example.com")
                    .with_header("authorization", basic.clone());
                black_box(proxy.serve(request, &handler));
            })
        });
    }
}

criterion_group!(benches, bench_chain_throughput);
criterion_main!(benches);

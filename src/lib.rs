//! # brrtguard
//!
//! **brrtguard** is a filter-chain request security pipeline. It decides CORS
//! before any business handler runs, and it establishes, threads through and
//! persists a per-request security context with pluggable persistence.
//!
//! The crate is transport-agnostic: the host server parses a request into an
//! [`HttpRequest`], hands it to a [`FilterChainProxy`] together with its
//! business [`Handler`], and writes back the [`HttpResponse`].
//!
//! ## Architecture
//!
//! - **[`cors`]** - CORS configurations, configuration sources (URL-pattern
//!   based and the dispatch-layer [`RouteCorsRegistry`](cors::RouteCorsRegistry)),
//!   the policy resolver and the CORS stage
//! - **[`security`]** - [`SecurityContext`], the [`SecurityContextRepository`]
//!   strategy with its session-backed and stateless implementations, the
//!   session store and the user store
//! - **[`filter`]** - the [`Filter`] trait and the built-in stages:
//!   context propagation, form login, HTTP Basic, anonymous, authorization,
//!   tracing and metrics
//! - **[`chain`]** - [`FilterChainBuilder`], [`FilterChain`] and
//!   [`FilterChainProxy`]
//! - **[`exchange`]** - the per-request [`Exchange`] threaded through every
//!   stage
//! - **[`config`]** - YAML configuration compiled into a proxy
//!
//! ### Request Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Host as Host server
//!     participant Proxy as FilterChainProxy
//!     participant Cors as CorsFilter
//!     participant Ctx as SecurityContext stage
//!     participant Auth as Authentication stages
//!     participant Authz as AuthorizationFilter
//!     participant Handler
//!
//!     Host->>Proxy: serve(request, handler)
//!     Proxy->>Proxy: select chain by path, create Exchange
//!     Proxy->>Cors: filter(exchange, next)
//!     alt preflight
//!         Cors-->>Proxy: 200 / 403 (chain short-circuits)
//!     else actual request
//!         Cors->>Ctx: next.run(exchange)
//!         Ctx->>Ctx: load context from repository
//!         Ctx->>Auth: next.run(exchange)
//!         Auth->>Authz: next.run(exchange)
//!         Authz->>Handler: handle(exchange)
//!         Handler-->>Ctx: response
//!         Ctx->>Ctx: save on exit (auto-save) or discard (explicit-save)
//!         Ctx-->>Cors: response
//!         Cors-->>Proxy: response + CORS headers
//!     end
//!     Proxy-->>Host: response + pending Set-Cookie
//! ```
//!
//! ### Two Propagation Modes
//!
//! 1. **Auto-save** ([`SecurityContextPersistenceFilter`](filter::SecurityContextPersistenceFilter)):
//!    the context is saved when the request leaves the chain, on success and
//!    on error.
//! 2. **Explicit-save** ([`SecurityContextHolderFilter`](filter::SecurityContextHolderFilter)):
//!    nothing is saved unless a stage calls
//!    [`Exchange::save_security_context`]. Selected with
//!    `security_context(|c| c.require_explicit_save(true))`.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use brrtguard::chain::{FilterChainBuilder, FilterChainProxy, SharedContext};
//! use brrtguard::cors::{CorsConfiguration, UrlBasedCorsConfigurationSource};
//! use brrtguard::exchange::{Exchange, HttpRequest, HttpResponse};
//! use brrtguard::filter::{handler_fn, Access};
//!
//! let cors = CorsConfiguration::builder()
//!     .allowed_origins(&["https://app.example.com"])
//!     .build()
//!     .unwrap();
//! let source = UrlBasedCorsConfigurationSource::new().with("/**", cors).unwrap();
//! let shared = SharedContext::new().with_cors_configuration_source(Arc::new(source));
//!
//! let chain = FilterChainBuilder::new(shared)
//!     .cors(|c| c)
//!     .security_context(|c| c.require_explicit_save(true))
//!     .authorize_requests(|a| a.any_request(Access::PermitAll))
//!     .build()
//!     .unwrap();
//! let proxy = FilterChainProxy::new(vec![chain]);
//!
//! let handler = handler_fn(|_: &mut Exchange| Ok(HttpResponse::empty(204)));
//! let request = HttpRequest::get("/api/items").with_header("origin", "https://app.example.com");
//! let response = proxy.serve(request, &handler);
//! assert_eq!(response.status, 204);
//! assert_eq!(
//!     response.get_header("access-control-allow-origin"),
//!     Some("https://app.example.com")
//! );
//! ```
//!
//! ## Configuration Errors
//!
//! Every wiring mistake is a [`ConfigError`] returned by
//! [`FilterChainBuilder::build`]: CORS enabled without a configuration
//! source, wildcard origins with credentials, malformed origins or patterns.
//! A chain that builds never fails a request because of its configuration.
//!
//! ## Logging
//!
//! Stages emit `tracing` events with structured fields. [`telemetry`]
//! installs a subscriber configured from `BRRTG_LOG_*` variables.

pub mod chain;
pub mod cli;
pub mod config;
pub mod cors;
pub mod error;
pub mod exchange;
pub mod filter;
pub mod ids;
pub mod matcher;
pub mod runtime_config;
pub mod security;
pub mod telemetry;

pub use chain::{FilterChain, FilterChainBuilder, FilterChainProxy, SecurityFilterChain, SharedContext};
pub use error::ConfigError;
pub use exchange::{Exchange, HttpRequest, HttpResponse};
pub use filter::{Filter, FilterError, Handler};
pub use security::{SecurityContext, SecurityContextRepository};

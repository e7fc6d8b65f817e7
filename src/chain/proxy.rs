use std::sync::Arc;

use tracing::{debug, error};

use super::filter_chain::SecurityFilterChain;
use crate::exchange::{Exchange, HttpRequest, HttpResponse};
use crate::filter::{FilterError, Handler};

/// Session cookie used for requests that match no chain
const DEFAULT_SESSION_COOKIE: &str = "SESSION";

/// Entry point for the host server
///
/// Holds the application's [`SecurityFilterChain`]s in registration order and
/// routes each request through the first one whose matcher accepts the path.
/// A request matched by no chain goes straight to the handler.
///
/// The proxy is immutable and `Send + Sync`; share it behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct FilterChainProxy {
    chains: Vec<SecurityFilterChain>,
}

impl FilterChainProxy {
    pub fn new(chains: Vec<SecurityFilterChain>) -> Self {
        Self { chains }
    }

    pub fn chains(&self) -> &[SecurityFilterChain] {
        &self.chains
    }

    /// First chain whose matcher accepts `path`
    pub fn chain_for(&self, path: &str) -> Option<&SecurityFilterChain> {
        self.chains.iter().find(|chain| chain.matches(path))
    }

    /// Stage names a request to `path` would pass through
    pub fn filters_for(&self, path: &str) -> Vec<&'static str> {
        self.chain_for(path)
            .map(|chain| chain.filter_names())
            .unwrap_or_default()
    }

    /// Fresh exchange for `request`, using the session cookie of its chain
    pub fn new_exchange(&self, request: HttpRequest) -> Exchange {
        let cookie = match self.chain_for(&request.path) {
            Some(chain) => Arc::clone(chain.session_cookie()),
            None => Arc::from(DEFAULT_SESSION_COOKIE),
        };
        Exchange::new(request, cookie)
    }

    /// Run an existing exchange through its chain and the handler
    ///
    /// Pending response headers are not merged; call [`Exchange::finish`]
    /// with the response, or use [`handle`](Self::handle).
    pub fn execute(
        &self,
        exchange: &mut Exchange,
        handler: &dyn Handler,
    ) -> Result<HttpResponse, FilterError> {
        match self.chain_for(&exchange.request().path) {
            Some(chain) => chain.chain().execute(exchange, handler),
            None => {
                debug!(
                    request_id = %exchange.request().request_id,
                    path = %exchange.request().path,
                    "no security filter chain matches"
                );
                handler.handle(exchange)
            }
        }
    }

    /// Process one request and return the finished response
    pub fn handle(
        &self,
        request: HttpRequest,
        handler: &dyn Handler,
    ) -> Result<HttpResponse, FilterError> {
        let mut exchange = self.new_exchange(request);
        let response = self.execute(&mut exchange, handler)?;
        Ok(exchange.finish(response))
    }

    /// Like [`handle`](Self::handle), but answers pipeline errors with `500`
    ///
    /// The `500` still carries pending headers, so a session created before
    /// the failure keeps its cookie.
    pub fn serve(&self, request: HttpRequest, handler: &dyn Handler) -> HttpResponse {
        let mut exchange = self.new_exchange(request);
        match self.execute(&mut exchange, handler) {
            Ok(response) => exchange.finish(response),
            Err(e) => {
                error!(
                    request_id = %exchange.request().request_id,
                    error = %e,
                    "security pipeline failed"
                );
                exchange.finish(HttpResponse::error(500, "Internal Server Error"))
            }
        }
    }
}

use tracing::trace;

use super::core::{Filter, FilterError, Next};
use crate::exchange::{Exchange, HttpResponse};
use crate::security::Authentication;

/// Gives unauthenticated requests an anonymous authentication
///
/// Runs after the authentication stages so that authorization always sees a
/// populated context. Anonymous authentications are never persisted.
#[derive(Debug, Default)]
pub struct AnonymousAuthenticationFilter;

impl AnonymousAuthenticationFilter {
    pub const NAME: &'static str = "anonymous";
}

impl Filter for AnonymousAuthenticationFilter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn filter(&self, exchange: &mut Exchange, next: Next<'_>) -> Result<HttpResponse, FilterError> {
        if exchange.security_context().is_empty() {
            trace!(request_id = %exchange.request().request_id, "populating anonymous authentication");
            exchange.set_authentication(Authentication::anonymous());
        }
        next.run(exchange)
    }
}

//! Security-context propagation stages.
//!
//! Two stages share one job, loading the context before downstream stages
//! run, and differ in who saves it:
//!
//! - [`SecurityContextPersistenceFilter`] saves automatically when the
//!   request leaves the chain, whether downstream succeeded or failed.
//! - [`SecurityContextHolderFilter`] never saves by itself. It installs a save
//!   hook on the [`Exchange`]; a stage that changes the context (form login)
//!   calls [`Exchange::save_security_context`]. If nobody does, the context
//!   is discarded.
//!
//! Both record the same applied marker, so a chain that ends up with the
//! stage twice still loads the context once.

use std::sync::Arc;

use tracing::{debug, warn};

use super::core::{Filter, FilterError, Next};
use crate::exchange::{ContextState, Exchange, HttpResponse};
use crate::security::SecurityContextRepository;

const APPLIED: &str = "security_context";

/// Legacy auto-save propagation
pub struct SecurityContextPersistenceFilter {
    repository: Arc<dyn SecurityContextRepository>,
}

impl SecurityContextPersistenceFilter {
    pub const NAME: &'static str = "security_context_persistence";

    pub fn new(repository: Arc<dyn SecurityContextRepository>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<dyn SecurityContextRepository> {
        &self.repository
    }
}

impl Filter for SecurityContextPersistenceFilter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn filter(&self, exchange: &mut Exchange, next: Next<'_>) -> Result<HttpResponse, FilterError> {
        if !exchange.mark_applied(APPLIED) {
            return next.run(exchange);
        }

        let context = self.repository.load_context(exchange)?;
        exchange.mark_loaded(context, Arc::clone(&self.repository));

        let outcome = next.run(exchange);

        let context = exchange.security_context().clone();
        let saved = self.repository.save_context(&context, exchange);
        match (outcome, saved) {
            (Ok(response), Ok(())) => {
                exchange.mark_saved();
                debug!(
                    request_id = %exchange.request().request_id,
                    repository = self.repository.name(),
                    "security context saved on exit"
                );
                Ok(response)
            }
            (Ok(_), Err(save_err)) => {
                exchange.mark_discarded();
                Err(save_err.into())
            }
            (Err(downstream), Ok(())) => {
                exchange.mark_saved();
                Err(downstream)
            }
            (Err(downstream), Err(save_err)) => {
                warn!(
                    request_id = %exchange.request().request_id,
                    error = %save_err,
                    "security context save failed after downstream error"
                );
                exchange.mark_discarded();
                Err(downstream)
            }
        }
    }
}

/// Explicit-save propagation
pub struct SecurityContextHolderFilter {
    repository: Arc<dyn SecurityContextRepository>,
}

impl SecurityContextHolderFilter {
    pub const NAME: &'static str = "security_context_holder";

    pub fn new(repository: Arc<dyn SecurityContextRepository>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<dyn SecurityContextRepository> {
        &self.repository
    }
}

impl Filter for SecurityContextHolderFilter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn filter(&self, exchange: &mut Exchange, next: Next<'_>) -> Result<HttpResponse, FilterError> {
        if !exchange.mark_applied(APPLIED) {
            return next.run(exchange);
        }

        let context = self.repository.load_context(exchange)?;
        exchange.mark_loaded(context, Arc::clone(&self.repository));
        exchange.install_save_hook(Arc::clone(&self.repository));

        let outcome = next.run(exchange);

        exchange.remove_save_hook();
        if exchange.context_state() == ContextState::Loaded {
            exchange.mark_discarded();
            debug!(
                request_id = %exchange.request().request_id,
                "security context not saved explicitly, discarded"
            );
        }
        outcome
    }
}

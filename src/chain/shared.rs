use std::fmt;
use std::sync::Arc;

use crate::cors::{CorsConfigurationSource, RouteCorsRegistry};
use crate::security::{InMemorySessionStore, SessionStore, UserDetailsService};

/// Collaborators shared by every chain built in one application
///
/// Stands in for the application context: the CORS source, the dispatch
/// layer's CORS integration, the session store and the user store are all
/// looked up here at build time. Nothing is looked up per request.
#[derive(Clone)]
pub struct SharedContext {
    cors_configuration_source: Option<Arc<dyn CorsConfigurationSource>>,
    dispatch_integration: Option<Arc<RouteCorsRegistry>>,
    session_store: Arc<dyn SessionStore>,
    user_details: Option<Arc<dyn UserDetailsService>>,
}

impl SharedContext {
    /// Empty context with a fresh in-memory session store
    pub fn new() -> Self {
        Self {
            cors_configuration_source: None,
            dispatch_integration: None,
            session_store: Arc::new(InMemorySessionStore::new()),
            user_details: None,
        }
    }

    pub fn with_cors_configuration_source(mut self, source: Arc<dyn CorsConfigurationSource>) -> Self {
        self.cors_configuration_source = Some(source);
        self
    }

    /// Make the dispatch layer's route CORS policies available to chains
    pub fn with_dispatch_integration(mut self, registry: Arc<RouteCorsRegistry>) -> Self {
        self.dispatch_integration = Some(registry);
        self
    }

    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = store;
        self
    }

    pub fn with_user_details(mut self, users: Arc<dyn UserDetailsService>) -> Self {
        self.user_details = Some(users);
        self
    }

    pub fn cors_configuration_source(&self) -> Option<&Arc<dyn CorsConfigurationSource>> {
        self.cors_configuration_source.as_ref()
    }

    pub fn dispatch_integration(&self) -> Option<&Arc<RouteCorsRegistry>> {
        self.dispatch_integration.as_ref()
    }

    pub fn session_store(&self) -> &Arc<dyn SessionStore> {
        &self.session_store
    }

    pub fn user_details(&self) -> Option<&Arc<dyn UserDetailsService>> {
        self.user_details.as_ref()
    }

    /// Whether a chain with CORS enabled could resolve a configuration source here
    pub fn has_cors_source(&self) -> bool {
        self.cors_configuration_source.is_some() || self.dispatch_integration.is_some()
    }
}

impl Default for SharedContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SharedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedContext")
            .field("cors_configuration_source", &self.cors_configuration_source.is_some())
            .field("dispatch_integration", &self.dispatch_integration.is_some())
            .field("user_details", &self.user_details.is_some())
            .finish_non_exhaustive()
    }
}

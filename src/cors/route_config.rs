use std::sync::Arc;

use http::Method;
use tracing::debug;

use super::configuration::{CorsConfiguration, CorsConfigurationBuilder};
use super::source::CorsConfigurationSource;
use crate::error::ConfigError;
use crate::matcher::PathPattern;

/// Route-specific CORS policy
///
/// - `Inherit`: use the global configuration (default)
/// - `Disabled`: no CORS policy for this route
/// - `Custom`: route-specific methods, headers, credentials and max-age;
///   origins always come from the global configuration
#[derive(Debug, Clone)]
pub enum RouteCorsPolicy {
    Inherit,
    Disabled,
    Custom(CorsConfigurationBuilder),
}

#[derive(Debug, Clone)]
struct RouteEntry {
    pattern: PathPattern,
    methods: Vec<Method>,
    configuration: Option<Arc<CorsConfiguration>>,
}

impl RouteEntry {
    fn accepts(&self, method: &Method) -> bool {
        self.methods.is_empty() || self.methods.contains(method)
    }
}

/// CORS integration exposed by the dispatch layer
///
/// The dispatch layer knows its routes and how each one wants CORS handled.
/// Placing a `RouteCorsRegistry` in the shared context lets a chain with CORS
/// enabled resolve policies without a separately registered
/// [`CorsConfigurationSource`].
///
/// Policies are resolved once at registration: `Inherit` routes share the
/// global configuration, `Custom` routes are merged with the global origins,
/// and lookups on the hot path only match patterns.
///
/// A request that maps to no registered route has no CORS policy.
#[derive(Debug, Clone)]
pub struct RouteCorsRegistry {
    global: Arc<CorsConfiguration>,
    routes: Vec<RouteEntry>,
}

impl RouteCorsRegistry {
    pub fn new(global: CorsConfiguration) -> Self {
        Self {
            global: Arc::new(global),
            routes: Vec::new(),
        }
    }

    pub fn global(&self) -> &Arc<CorsConfiguration> {
        &self.global
    }

    /// Register a route; `methods` empty means every method
    ///
    /// # Errors
    ///
    /// Fails when the pattern is invalid or when a `Custom` policy enables
    /// credentials while the global origins are `*` or empty.
    pub fn route(
        &mut self,
        pattern: &str,
        methods: &[Method],
        policy: RouteCorsPolicy,
    ) -> Result<&mut Self, ConfigError> {
        let pattern = PathPattern::parse(pattern)?;
        let configuration = match policy {
            RouteCorsPolicy::Inherit => Some(Arc::clone(&self.global)),
            RouteCorsPolicy::Disabled => None,
            RouteCorsPolicy::Custom(route) => {
                let origins = self.global.origin_validation().clone();
                Some(Arc::new(route.build_with_origins(origins)?))
            }
        };
        debug!(
            pattern = %pattern,
            cors = configuration.is_some(),
            "dispatch route registered for CORS"
        );
        self.routes.push(RouteEntry {
            pattern,
            methods: methods.to_vec(),
            configuration,
        });
        Ok(self)
    }

    /// Builder-style variant of [`route`](Self::route)
    pub fn with_route(
        mut self,
        pattern: &str,
        methods: &[Method],
        policy: RouteCorsPolicy,
    ) -> Result<Self, ConfigError> {
        self.route(pattern, methods, policy)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl CorsConfigurationSource for RouteCorsRegistry {
    fn configuration_for(&self, method: &Method, path: &str) -> Option<Arc<CorsConfiguration>> {
        // A preflight asks about the route of the method it announces; the
        // resolver passes that method in, so OPTIONS never has to be registered.
        let candidates = self
            .routes
            .iter()
            .filter(|r| r.accepts(method))
            .map(|r| (&r.pattern, &r.configuration));
        PathPattern::most_specific(candidates, path).and_then(|c| c.as_ref().map(Arc::clone))
    }
}

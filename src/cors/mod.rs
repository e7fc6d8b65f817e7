//! Cross-origin resource sharing.
//!
//! A [`CorsConfiguration`] describes what a set of URLs allows. A
//! [`CorsConfigurationSource`] picks the configuration for a request: either
//! a [`UrlBasedCorsConfigurationSource`] registered directly, or the
//! dispatch layer's [`RouteCorsRegistry`]. The [`CorsPolicyResolver`] turns
//! that into a [`CorsDecision`], and the [`CorsFilter`] stage acts on it.

mod configuration;
mod filter;
mod resolver;
mod route_config;
mod source;

pub use configuration::{CorsConfiguration, CorsConfigurationBuilder, OriginValidation};
pub use filter::{CorsFilter, CorsRejectPolicy};
pub use resolver::{CorsDecision, CorsPolicyResolver, DenyReason};
pub use route_config::{RouteCorsPolicy, RouteCorsRegistry};
pub use source::{CorsConfigurationSource, UrlBasedCorsConfigurationSource};

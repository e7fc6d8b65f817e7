use std::sync::Arc;

use http::Method;

use super::configuration::CorsConfiguration;
use crate::error::ConfigError;
use crate::matcher::PathPattern;

/// Supplies the [`CorsConfiguration`] that applies to a request
///
/// `None` means no CORS policy applies: the request passes through untouched,
/// it is not denied.
pub trait CorsConfigurationSource: Send + Sync {
    fn configuration_for(&self, method: &Method, path: &str) -> Option<Arc<CorsConfiguration>>;
}

/// Maps URL patterns to configurations; the most specific matching pattern wins
#[derive(Debug, Default, Clone)]
pub struct UrlBasedCorsConfigurationSource {
    entries: Vec<(PathPattern, Arc<CorsConfiguration>)>,
}

impl UrlBasedCorsConfigurationSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `configuration` for URLs matching `pattern`
    ///
    /// Registering the same pattern twice replaces the earlier configuration.
    pub fn register(
        &mut self,
        pattern: &str,
        configuration: CorsConfiguration,
    ) -> Result<&mut Self, ConfigError> {
        let pattern = PathPattern::parse(pattern)?;
        let configuration = Arc::new(configuration);
        match self.entries.iter_mut().find(|(p, _)| *p == pattern) {
            Some(entry) => entry.1 = configuration,
            None => self.entries.push((pattern, configuration)),
        }
        Ok(self)
    }

    /// Builder-style variant of [`register`](Self::register)
    pub fn with(mut self, pattern: &str, configuration: CorsConfiguration) -> Result<Self, ConfigError> {
        self.register(pattern, configuration)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(p, _)| p.as_str())
    }
}

impl CorsConfigurationSource for UrlBasedCorsConfigurationSource {
    fn configuration_for(&self, _method: &Method, path: &str) -> Option<Arc<CorsConfiguration>> {
        PathPattern::most_specific(self.entries.iter().map(|(p, c)| (p, c)), path).map(Arc::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(origin: &str) -> CorsConfiguration {
        CorsConfiguration::builder()
            .allowed_origins(&[origin])
            .build()
            .unwrap()
    }

    #[test]
    fn test_most_specific_pattern_wins() {
        let source = UrlBasedCorsConfigurationSource::new()
            .with("/**", cfg("https://all.com"))
            .unwrap()
            .with("/api/**", cfg("https://api.com"))
            .unwrap();
        let api = source.configuration_for(&Method::GET, "/api/users").unwrap();
        assert!(api.check_origin("https://api.com").is_some());
        let root = source.configuration_for(&Method::GET, "/index.html").unwrap();
        assert!(root.check_origin("https://all.com").is_some());
    }

    #[test]
    fn test_no_match_is_none() {
        let source = UrlBasedCorsConfigurationSource::new()
            .with("/api/**", cfg("https://api.com"))
            .unwrap();
        assert!(source.configuration_for(&Method::GET, "/static/app.js").is_none());
    }

    #[test]
    fn test_reregistering_replaces() {
        let mut source = UrlBasedCorsConfigurationSource::new();
        source.register("/**", cfg("https://a.com")).unwrap();
        source.register("/**", cfg("https://b.com")).unwrap();
        assert_eq!(source.len(), 1);
        let c = source.configuration_for(&Method::GET, "/").unwrap();
        assert!(c.check_origin("https://b.com").is_some());
    }
}

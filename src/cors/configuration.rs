use std::sync::Arc;

use http::Method;
use regex::Regex;

use crate::error::ConfigError;

/// Origin validation strategy
#[derive(Clone)]
pub enum OriginValidation {
    /// Exact string matching
    Exact(Vec<String>),
    /// Wildcard (allow all origins)
    Wildcard,
    /// Origin patterns such as `https://*.example.com`, compiled to regexes
    Pattern(Vec<Regex>),
    /// Custom validation function
    Custom(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl std::fmt::Debug for OriginValidation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OriginValidation::Exact(origins) => f.debug_tuple("Exact").field(origins).finish(),
            OriginValidation::Wildcard => write!(f, "Wildcard"),
            OriginValidation::Pattern(patterns) => f
                .debug_tuple("Pattern")
                .field(&patterns.iter().map(|re| re.as_str()).collect::<Vec<_>>())
                .finish(),
            OriginValidation::Custom(_) => write!(f, "Custom(<function>)"),
        }
    }
}

impl OriginValidation {
    /// Check if an origin is allowed
    pub fn is_allowed(&self, origin: &str) -> bool {
        match self {
            OriginValidation::Exact(origins) => {
                origins.iter().any(|o| o.eq_ignore_ascii_case(origin))
            }
            OriginValidation::Wildcard => true,
            OriginValidation::Pattern(patterns) => patterns.iter().any(|re| re.is_match(origin)),
            OriginValidation::Custom(validator) => validator(origin),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, OriginValidation::Wildcard)
    }

    /// Build the strategy for a list of configured origins
    ///
    /// `*` anywhere in the list means all origins. Entries containing `*`
    /// elsewhere are origin patterns; everything else must be a literal
    /// `scheme://host[:port]`.
    pub fn from_origins(origins: &[String]) -> Result<Self, ConfigError> {
        if origins.iter().any(|o| o == "*") {
            return Ok(OriginValidation::Wildcard);
        }
        if origins.iter().any(|o| o.contains('*')) {
            let patterns = origins
                .iter()
                .map(|o| compile_origin_pattern(o))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(OriginValidation::Pattern(patterns));
        }
        for origin in origins {
            validate_origin_format(origin)?;
        }
        Ok(OriginValidation::Exact(origins.to_vec()))
    }
}

fn validate_origin_format(origin: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::InvalidOriginFormat {
        origin: origin.to_string(),
    };
    let parsed = url::Url::parse(origin).map_err(|_| invalid())?;
    let bare = parsed.path() == "/" && !origin.ends_with('/');
    if parsed.host_str().is_none() || !bare || parsed.query().is_some() {
        return Err(invalid());
    }
    Ok(())
}

fn compile_origin_pattern(pattern: &str) -> Result<Regex, ConfigError> {
    let mut expr = String::from("(?i)^");
    for (i, part) in pattern.split('*').enumerate() {
        if i > 0 {
            expr.push_str("[^/]*");
        }
        expr.push_str(&regex::escape(part));
    }
    expr.push('$');
    Regex::new(&expr).map_err(|e| ConfigError::InvalidOriginPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// An immutable CORS policy for a set of URLs
///
/// Built through [`CorsConfiguration::builder`], which enforces the
/// wildcard/credentials invariant, so a `CorsConfiguration` value is always
/// valid.
#[derive(Debug, Clone)]
pub struct CorsConfiguration {
    pub(crate) origin_validation: OriginValidation,
    pub(crate) allowed_methods: Vec<Method>,
    pub(crate) allowed_headers: Vec<String>,
    pub(crate) expose_headers: Vec<String>,
    pub(crate) allow_credentials: bool,
    pub(crate) max_age: Option<u32>,
}

impl CorsConfiguration {
    pub fn builder() -> CorsConfigurationBuilder {
        CorsConfigurationBuilder::new()
    }

    /// Permissive defaults: all origins, `GET, HEAD, POST`, all headers, 30 minute preflight cache
    pub fn permit_defaults() -> Self {
        Self {
            origin_validation: OriginValidation::Wildcard,
            allowed_methods: vec![Method::GET, Method::HEAD, Method::POST],
            allowed_headers: vec!["*".to_string()],
            expose_headers: vec![],
            allow_credentials: false,
            max_age: Some(1800),
        }
    }

    /// Return the value for `Access-Control-Allow-Origin`, or `None` if the origin is rejected
    ///
    /// Wildcard configurations answer `*` (credentials are never combined
    /// with a wildcard); every other strategy echoes the request origin.
    pub fn check_origin(&self, origin: &str) -> Option<String> {
        if !self.origin_validation.is_allowed(origin) {
            return None;
        }
        if self.origin_validation.is_wildcard() {
            Some("*".to_string())
        } else {
            Some(origin.to_string())
        }
    }

    pub fn check_method(&self, method: &Method) -> bool {
        // HEAD is implied by GET
        self.allowed_methods.contains(method)
            || (*method == Method::HEAD && self.allowed_methods.contains(&Method::GET))
    }

    /// Return the first requested header that is not allowed
    pub fn first_rejected_header<'a>(&self, requested: &'a str) -> Option<&'a str> {
        if self.allowed_headers.iter().any(|h| h == "*") {
            return None;
        }
        requested
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .find(|h| !self.allowed_headers.iter().any(|a| a.eq_ignore_ascii_case(h)))
    }

    pub fn origin_validation(&self) -> &OriginValidation {
        &self.origin_validation
    }

    pub fn allowed_methods(&self) -> &[Method] {
        &self.allowed_methods
    }

    pub fn allowed_headers(&self) -> &[String] {
        &self.allowed_headers
    }

    pub fn expose_headers(&self) -> &[String] {
        &self.expose_headers
    }

    pub fn allow_credentials(&self) -> bool {
        self.allow_credentials
    }

    pub fn max_age(&self) -> Option<u32> {
        self.max_age
    }
}

/// Builder for [`CorsConfiguration`] with a fluent API
///
/// # Example
///
/// ```rust
/// use brrtguard::cors::CorsConfiguration;
/// use http::Method;
///
/// let cors = CorsConfiguration::builder()
///     .allowed_origins(&["https://example.com", "https://api.example.com"])
///     .allowed_methods(&[Method::GET, Method::POST, Method::PUT])
///     .allowed_headers(&["Content-Type", "Authorization"])
///     .allow_credentials(true)
///     .expose_headers(&["X-Total-Count"])
///     .max_age(3600)
///     .build()
///     .unwrap();
/// assert!(cors.allow_credentials());
/// ```
#[derive(Clone)]
pub struct CorsConfigurationBuilder {
    allowed_origins: Vec<String>,
    allowed_headers: Vec<String>,
    allowed_methods: Vec<String>,
    allow_credentials: bool,
    expose_headers: Vec<String>,
    max_age: Option<u32>,
    custom: Option<Arc<dyn Fn(&str) -> bool + Send + Sync>>,
}

impl CorsConfigurationBuilder {
    /// Create a new builder with secure defaults
    ///
    /// Default configuration:
    /// - No origins allowed (empty list)
    /// - Common headers: `["Content-Type", "Authorization"]`
    /// - Common methods: `GET, POST, PUT, DELETE, OPTIONS`
    /// - Credentials: `false`
    /// - Exposed headers: empty
    /// - Max age: `None` (no preflight caching)
    pub fn new() -> Self {
        Self {
            allowed_origins: vec![],
            allowed_headers: vec!["Content-Type".into(), "Authorization".into()],
            allowed_methods: ["GET", "POST", "PUT", "DELETE", "OPTIONS"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            allow_credentials: false,
            expose_headers: vec![],
            max_age: None,
            custom: None,
        }
    }

    /// Set allowed origins
    ///
    /// - `&["*"]` allows all origins; cannot be combined with credentials
    /// - entries such as `https://*.example.com` are origin patterns
    pub fn allowed_origins(mut self, origins: &[&str]) -> Self {
        self.allowed_origins = origins.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn allowed_methods(mut self, methods: &[Method]) -> Self {
        self.allowed_methods = methods.iter().map(|m| m.as_str().to_string()).collect();
        self
    }

    /// Set allowed methods by name; names are validated in [`build`](Self::build)
    pub fn allowed_method_names<S: AsRef<str>>(mut self, methods: &[S]) -> Self {
        self.allowed_methods = methods.iter().map(|m| m.as_ref().to_string()).collect();
        self
    }

    /// Set allowed headers; `&["*"]` allows all headers
    pub fn allowed_headers(mut self, headers: &[&str]) -> Self {
        self.allowed_headers = headers.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Enable or disable credentials
    ///
    /// When enabled, sets `Access-Control-Allow-Credentials: true`.
    /// **Important**: Cannot be used with wildcard origin (`*`).
    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.allow_credentials = allow;
        self
    }

    /// Set headers to expose to JavaScript
    pub fn expose_headers(mut self, headers: &[&str]) -> Self {
        self.expose_headers = headers.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Set preflight cache duration in seconds
    pub fn max_age(mut self, seconds: u32) -> Self {
        self.max_age = Some(seconds);
        self
    }

    /// Validate origins with a function instead of a list
    pub fn origin_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.custom = Some(Arc::new(validator));
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    ///
    /// - `WildcardWithCredentials` if credentials are enabled with origin `*`
    /// - `EmptyOriginsWithCredentials` if credentials are enabled without origins
    /// - `InvalidOriginFormat` / `InvalidOriginPattern` for malformed origins
    /// - `InvalidMethod` for a method name that is not an HTTP token
    pub fn build(self) -> Result<CorsConfiguration, ConfigError> {
        let origin_validation = match &self.custom {
            Some(validator) => OriginValidation::Custom(Arc::clone(validator)),
            None => OriginValidation::from_origins(&self.allowed_origins)?,
        };
        self.build_with_origins(origin_validation)
    }

    /// Build against origins supplied from elsewhere
    ///
    /// Route policies carry methods, headers and credentials but take their
    /// origins from the global configuration; any origins set on this
    /// builder are ignored.
    pub fn build_with_origins(
        self,
        origin_validation: OriginValidation,
    ) -> Result<CorsConfiguration, ConfigError> {
        if self.allow_credentials {
            if origin_validation.is_wildcard() {
                return Err(ConfigError::WildcardWithCredentials);
            }
            if matches!(&origin_validation, OriginValidation::Exact(list) if list.is_empty()) {
                return Err(ConfigError::EmptyOriginsWithCredentials);
            }
        }

        let allowed_methods = self
            .allowed_methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                    .map_err(|_| ConfigError::InvalidMethod { method: m.clone() })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CorsConfiguration {
            origin_validation,
            allowed_methods,
            allowed_headers: self.allowed_headers,
            expose_headers: self.expose_headers,
            allow_credentials: self.allow_credentials,
            max_age: self.max_age,
        })
    }
}

impl std::fmt::Debug for CorsConfigurationBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorsConfigurationBuilder")
            .field("allowed_origins", &self.allowed_origins)
            .field("allowed_methods", &self.allowed_methods)
            .field("allow_credentials", &self.allow_credentials)
            .field("custom", &self.custom.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for CorsConfigurationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_with_credentials_rejected() {
        let err = CorsConfiguration::builder()
            .allowed_origins(&["*"])
            .allow_credentials(true)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::WildcardWithCredentials);
    }

    #[test]
    fn test_empty_origins_with_credentials_rejected() {
        let err = CorsConfiguration::builder()
            .allow_credentials(true)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::EmptyOriginsWithCredentials);
    }

    #[test]
    fn test_invalid_origin_format() {
        for bad in ["example.com", "https://example.com/path", "https://example.com/"] {
            let err = CorsConfiguration::builder()
                .allowed_origins(&[bad])
                .build()
                .unwrap_err();
            assert!(matches!(err, ConfigError::InvalidOriginFormat { .. }), "{bad}");
        }
    }

    #[test]
    fn test_invalid_method_name() {
        let err = CorsConfiguration::builder()
            .allowed_origins(&["https://a.com"])
            .allowed_method_names(&["GE T"])
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMethod { .. }));
    }

    #[test]
    fn test_check_origin_echo_and_wildcard() {
        let exact = CorsConfiguration::builder()
            .allowed_origins(&["https://a.com"])
            .build()
            .unwrap();
        assert_eq!(exact.check_origin("https://a.com").as_deref(), Some("https://a.com"));
        assert_eq!(exact.check_origin("https://b.com"), None);

        let any = CorsConfiguration::permit_defaults();
        assert_eq!(any.check_origin("https://b.com").as_deref(), Some("*"));
    }

    #[test]
    fn test_origin_patterns() {
        let cfg = CorsConfiguration::builder()
            .allowed_origins(&["https://*.example.com"])
            .build()
            .unwrap();
        assert!(cfg.check_origin("https://app.example.com").is_some());
        assert!(cfg.check_origin("https://example.com").is_none());
        assert!(cfg.check_origin("https://evil.com/.example.com").is_none());
    }

    #[test]
    fn test_headers_and_methods() {
        let cfg = CorsConfiguration::builder()
            .allowed_origins(&["https://a.com"])
            .allowed_methods(&[Method::GET])
            .allowed_headers(&["Content-Type"])
            .build()
            .unwrap();
        assert!(cfg.check_method(&Method::HEAD));
        assert!(!cfg.check_method(&Method::DELETE));
        assert_eq!(cfg.first_rejected_header("content-type"), None);
        assert_eq!(cfg.first_rejected_header("content-type, X-Custom"), Some("X-Custom"));
    }

    #[test]
    fn test_build_with_global_origins() {
        let global = OriginValidation::from_origins(&["https://app.com".to_string()]).unwrap();
        let route = CorsConfiguration::builder()
            .allowed_origins(&["https://ignored.com"])
            .allow_credentials(true)
            .build_with_origins(global)
            .unwrap();
        assert!(route.check_origin("https://app.com").is_some());
        assert!(route.check_origin("https://ignored.com").is_none());

        let err = CorsConfiguration::builder()
            .allow_credentials(true)
            .build_with_origins(OriginValidation::Wildcard)
            .unwrap_err();
        assert_eq!(err, ConfigError::WildcardWithCredentials);
    }
}

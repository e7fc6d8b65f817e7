use std::fmt;

/// Configuration error raised while wiring a security filter chain
///
/// Every variant is detected at build time, before the first request is
/// handled. A chain that builds successfully never fails a request because of
/// its own configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// CORS is enabled but no configuration source can be found
    ///
    /// Neither the CORS configurer, the shared context, nor a dispatch-layer
    /// integration supplied a `CorsConfigurationSource`.
    MissingCorsIntegration,
    /// Wildcard origin (`*`) cannot be used with credentials
    WildcardWithCredentials,
    /// Empty origins list with credentials
    EmptyOriginsWithCredentials,
    /// Origin is not of the form `scheme://host[:port]`
    InvalidOriginFormat {
        /// The invalid origin string
        origin: String,
    },
    /// Origin pattern could not be compiled
    InvalidOriginPattern {
        /// The offending pattern
        pattern: String,
        /// Compiler diagnostic
        reason: String,
    },
    /// HTTP method name is not a valid token
    InvalidMethod {
        /// The offending method name
        method: String,
    },
    /// URL pattern could not be compiled
    InvalidPathPattern {
        /// The offending pattern
        pattern: String,
        /// Why it was rejected
        reason: String,
    },
    /// Authorization expression could not be parsed
    InvalidAccessExpression {
        /// The offending expression
        expression: String,
    },
    /// An authentication stage was configured without a user store
    MissingUserDetailsService {
        /// Stage that needs the user store
        stage: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingCorsIntegration => write!(
                f,
                "CORS configuration error: CORS is enabled but no CorsConfigurationSource is available. \
                Please ensure a CorsConfigurationSource is registered, or that the security pipeline and \
                the dispatch layer are configured in a shared context."
            ),
            ConfigError::WildcardWithCredentials => write!(
                f,
                "CORS configuration error: Cannot use wildcard origin (*) with credentials. \
                When allow_credentials is true, you must specify exact origins or origin patterns."
            ),
            ConfigError::EmptyOriginsWithCredentials => write!(
                f,
                "CORS configuration error: Cannot use credentials with empty origins list. \
                When allow_credentials is true, at least one origin must be specified."
            ),
            ConfigError::InvalidOriginFormat { origin } => write!(
                f,
                "CORS configuration error: Invalid origin format '{origin}'. \
                Expected format: scheme://host:port (e.g., https://example.com)"
            ),
            ConfigError::InvalidOriginPattern { pattern, reason } => write!(
                f,
                "CORS configuration error: Invalid origin pattern '{pattern}': {reason}"
            ),
            ConfigError::InvalidMethod { method } => {
                write!(f, "Configuration error: '{method}' is not a valid HTTP method")
            }
            ConfigError::InvalidPathPattern { pattern, reason } => {
                write!(f, "Configuration error: Invalid path pattern '{pattern}': {reason}")
            }
            ConfigError::InvalidAccessExpression { expression } => write!(
                f,
                "Configuration error: Invalid access expression '{expression}'. Expected one of \
                permit_all, deny_all, authenticated, anonymous, has_role(R), has_any_role(R1, R2), \
                has_authority(A)"
            ),
            ConfigError::MissingUserDetailsService { stage } => write!(
                f,
                "Configuration error: {stage} requires a UserDetailsService in the shared context"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

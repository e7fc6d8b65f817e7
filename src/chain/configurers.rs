//! Configurers accepted by [`FilterChainBuilder`](super::FilterChainBuilder).
//!
//! Each configurer is passed by value into a closure and handed back:
//!
//! ```ignore
//! builder.security_context(|c| c.require_explicit_save(true))
//! ```
//!
//! Calling the same builder method again hands the closure the configurer
//! produced by the earlier call, so repeated calls refine one instance rather
//! than registering a second stage.

use std::fmt;
use std::sync::Arc;

use http::Method;
use serde::Deserialize;
use tracing::debug;

use crate::cors::{CorsConfigurationSource, CorsRejectPolicy};
use crate::filter::{Access, FormLoginSettings};
use crate::security::SecurityContextRepository;

/// CORS stage settings
#[derive(Default)]
pub struct CorsConfigurer {
    pub(crate) disabled: bool,
    pub(crate) source: Option<Arc<dyn CorsConfigurationSource>>,
    pub(crate) reject_policy: CorsRejectPolicy,
}

impl CorsConfigurer {
    /// Use this source instead of the one found in the shared context
    pub fn configuration_source(mut self, source: Arc<dyn CorsConfigurationSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Remove the CORS stage from the chain
    pub fn disable(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub fn reject_policy(mut self, policy: CorsRejectPolicy) -> Self {
        self.reject_policy = policy;
        self
    }
}

impl fmt::Debug for CorsConfigurer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorsConfigurer")
            .field("disabled", &self.disabled)
            .field("source", &self.source.is_some())
            .field("reject_policy", &self.reject_policy)
            .finish()
    }
}

/// Security-context stage settings
///
/// The first repository configured is the one used; later
/// [`security_context_repository`](Self::security_context_repository) calls
/// are ignored.
#[derive(Default)]
pub struct SecurityContextConfigurer {
    pub(crate) disabled: bool,
    pub(crate) repository: Option<Arc<dyn SecurityContextRepository>>,
    pub(crate) require_explicit_save: bool,
}

impl SecurityContextConfigurer {
    pub fn security_context_repository(mut self, repository: Arc<dyn SecurityContextRepository>) -> Self {
        match &self.repository {
            Some(existing) => debug!(
                kept = existing.name(),
                ignored = repository.name(),
                "security context repository already configured"
            ),
            None => self.repository = Some(repository),
        }
        self
    }

    /// Replace the auto-saving stage with the explicit-save stage
    pub fn require_explicit_save(mut self, required: bool) -> Self {
        self.require_explicit_save = required;
        self
    }

    /// Remove the security-context stage from the chain
    pub fn disable(mut self) -> Self {
        self.disabled = true;
        self
    }
}

impl fmt::Debug for SecurityContextConfigurer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityContextConfigurer")
            .field("disabled", &self.disabled)
            .field("repository", &self.repository.as_ref().map(|r| r.name()))
            .field("require_explicit_save", &self.require_explicit_save)
            .finish()
    }
}

/// When the session-backed repository may create sessions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionCreationPolicy {
    /// Create a session on every save, even for an anonymous request
    Always,
    /// Create a session when there is an authentication worth keeping
    #[default]
    IfRequired,
    /// Use an existing session but never create one
    Never,
    /// No session at all; the context lives for one request
    Stateless,
}

/// Session settings
#[derive(Debug, Clone)]
pub struct SessionManagementConfigurer {
    pub(crate) creation_policy: SessionCreationPolicy,
    pub(crate) cookie_name: String,
}

impl Default for SessionManagementConfigurer {
    fn default() -> Self {
        Self {
            creation_policy: SessionCreationPolicy::default(),
            cookie_name: "SESSION".to_string(),
        }
    }
}

impl SessionManagementConfigurer {
    pub fn session_creation_policy(mut self, policy: SessionCreationPolicy) -> Self {
        self.creation_policy = policy;
        self
    }

    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }
}

/// Form-login stage settings
#[derive(Debug, Clone, Default)]
pub struct FormLoginConfigurer {
    pub(crate) settings: FormLoginSettings,
}

impl FormLoginConfigurer {
    pub fn login_page(mut self, page: impl Into<String>) -> Self {
        self.settings.login_page = page.into();
        self
    }

    pub fn login_processing_url(mut self, url: impl Into<String>) -> Self {
        self.settings.login_processing_url = url.into();
        self
    }

    pub fn default_success_url(mut self, url: impl Into<String>) -> Self {
        self.settings.default_success_url = url.into();
        self
    }

    pub fn failure_url(mut self, url: impl Into<String>) -> Self {
        self.settings.failure_url = url.into();
        self
    }

    pub fn username_parameter(mut self, name: impl Into<String>) -> Self {
        self.settings.username_parameter = name.into();
        self
    }

    pub fn password_parameter(mut self, name: impl Into<String>) -> Self {
        self.settings.password_parameter = name.into();
        self
    }

    /// Whether `GET login_page` is answered by the stage itself
    pub fn serve_login_page(mut self, serve: bool) -> Self {
        self.settings.serve_login_page = serve;
        self
    }

    pub fn settings(&self) -> &FormLoginSettings {
        &self.settings
    }
}

/// HTTP Basic stage settings
#[derive(Debug, Clone)]
pub struct HttpBasicConfigurer {
    pub(crate) realm: String,
}

impl Default for HttpBasicConfigurer {
    fn default() -> Self {
        Self {
            realm: "Realm".to_string(),
        }
    }
}

impl HttpBasicConfigurer {
    pub fn realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = realm.into();
        self
    }
}

/// Anonymous-authentication stage settings
#[derive(Debug, Clone, Default)]
pub struct AnonymousConfigurer {
    pub(crate) disabled: bool,
}

impl AnonymousConfigurer {
    pub fn disable(mut self) -> Self {
        self.disabled = true;
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PendingRule {
    pub(crate) pattern: String,
    pub(crate) methods: Vec<Method>,
    pub(crate) access: Access,
}

/// Authorization rules, checked in the order they are added
///
/// Patterns are compiled when the chain is built, so an invalid pattern is
/// reported by [`build`](super::FilterChainBuilder::build).
#[derive(Debug, Clone, Default)]
pub struct AuthorizeRequestsConfigurer {
    pub(crate) rules: Vec<PendingRule>,
}

impl AuthorizeRequestsConfigurer {
    /// Rule for every method on `pattern`
    pub fn request_matchers(self, pattern: &str, access: Access) -> Self {
        self.request_matchers_for(&[], pattern, access)
    }

    /// Rule for `methods` on `pattern`; an empty slice means every method
    pub fn request_matchers_for(mut self, methods: &[Method], pattern: &str, access: Access) -> Self {
        self.rules.push(PendingRule {
            pattern: pattern.to_string(),
            methods: methods.to_vec(),
            access,
        });
        self
    }

    /// Catch-all rule; only meaningful as the last one
    pub fn any_request(self, access: Access) -> Self {
        self.request_matchers("/**", access)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

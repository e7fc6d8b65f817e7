//! YAML configuration file.
//!
//! A [`GuardConfig`] describes one security filter chain plus the shared
//! collaborators it needs (CORS source, dispatch routes, users, session
//! store). [`GuardConfig::into_proxy`] compiles it; every configuration
//! mistake surfaces there as a [`ConfigError`], before any request is served.
//!
//! ```yaml
//! cors:
//!   reject: forbid
//!   configurations:
//!     "/api/**": { allowed_origins: ["https://app.example.com"], allow_credentials: true }
//! security_context:
//!   require_explicit_save: true
//! form_login: {}
//! users:
//!   - { username: user, password: password, roles: [USER] }
//! authorize:
//!   - { pattern: "/admin/**", access: "has_role(ADMIN)" }
//!   - { pattern: "/**", access: authenticated }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use http::Method;
use serde::Deserialize;

use crate::chain::{FilterChainBuilder, FilterChainProxy, SecurityFilterChain, SessionCreationPolicy, SharedContext};
use crate::cors::{
    CorsConfigurationBuilder, CorsRejectPolicy, RouteCorsPolicy, RouteCorsRegistry,
    UrlBasedCorsConfigurationSource,
};
use crate::error::ConfigError;
use crate::filter::Access;
use crate::runtime_config::RuntimeConfig;
use crate::security::{InMemorySessionStore, InMemoryUserDetailsManager, NullSecurityContextRepository, UserDetails};

fn default_true() -> bool {
    true
}

fn default_security_matcher() -> String {
    "/**".to_string()
}

/// Root of the configuration file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuardConfig {
    /// Requests the chain applies to
    #[serde(default = "default_security_matcher")]
    pub security_matcher: String,
    /// Wrap each request in a `request` span
    #[serde(default)]
    pub tracing: bool,
    #[serde(default)]
    pub cors: Option<CorsSection>,
    #[serde(default)]
    pub dispatch: Option<DispatchSection>,
    #[serde(default)]
    pub security_context: SecurityContextSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub form_login: Option<FormLoginSection>,
    #[serde(default)]
    pub http_basic: Option<HttpBasicSection>,
    #[serde(default)]
    pub anonymous: AnonymousSection,
    #[serde(default)]
    pub users: Vec<UserDetails>,
    #[serde(default)]
    pub authorize: Vec<AuthorizeRule>,
}

/// One CORS configuration as written in the file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorsSettings {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Option<Vec<String>>,
    pub allowed_headers: Option<Vec<String>>,
    #[serde(default)]
    pub expose_headers: Vec<String>,
    #[serde(default)]
    pub allow_credentials: bool,
    pub max_age: Option<u32>,
}

impl CorsSettings {
    fn to_builder(&self) -> CorsConfigurationBuilder {
        let mut builder = CorsConfigurationBuilder::new()
            .allowed_origins(&as_strs(&self.allowed_origins))
            .expose_headers(&as_strs(&self.expose_headers))
            .allow_credentials(self.allow_credentials);
        if let Some(methods) = &self.allowed_methods {
            builder = builder.allowed_method_names(methods);
        }
        if let Some(headers) = &self.allowed_headers {
            builder = builder.allowed_headers(&as_strs(headers));
        }
        if let Some(max_age) = self.max_age {
            builder = builder.max_age(max_age);
        }
        builder
    }
}

fn as_strs(values: &[String]) -> Vec<&str> {
    values.iter().map(String::as_str).collect()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorsSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub reject: CorsRejectPolicy,
    /// Pattern → configuration; when empty the dispatch routes are used
    #[serde(default)]
    pub configurations: BTreeMap<String, CorsSettings>,
}

/// Dispatch-layer routes and their CORS handling
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchSection {
    pub global: CorsSettings,
    #[serde(default)]
    pub routes: Vec<DispatchRoute>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchRoute {
    pub pattern: String,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub cors: RouteCorsSetting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteCorsKeyword {
    Inherit,
    Disabled,
}

/// `true`/`inherit`, `false`/`disabled`, or a map of route-specific settings
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RouteCorsSetting {
    Flag(bool),
    Keyword(RouteCorsKeyword),
    Custom(CorsSettings),
}

impl Default for RouteCorsSetting {
    fn default() -> Self {
        RouteCorsSetting::Keyword(RouteCorsKeyword::Inherit)
    }
}

impl RouteCorsSetting {
    fn to_policy(&self) -> RouteCorsPolicy {
        match self {
            RouteCorsSetting::Flag(true) | RouteCorsSetting::Keyword(RouteCorsKeyword::Inherit) => {
                RouteCorsPolicy::Inherit
            }
            RouteCorsSetting::Flag(false) | RouteCorsSetting::Keyword(RouteCorsKeyword::Disabled) => {
                RouteCorsPolicy::Disabled
            }
            RouteCorsSetting::Custom(settings) => RouteCorsPolicy::Custom(settings.to_builder()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepositoryKind {
    /// Session-backed, governed by `session.creation_policy`
    #[default]
    Session,
    /// Never persisted
    Stateless,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityContextSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub require_explicit_save: bool,
    #[serde(default)]
    pub repository: RepositoryKind,
}

impl Default for SecurityContextSection {
    fn default() -> Self {
        Self {
            enabled: true,
            require_explicit_save: false,
            repository: RepositoryKind::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionSection {
    #[serde(default)]
    pub creation_policy: SessionCreationPolicy,
    pub cookie_name: Option<String>,
    /// Idle timeout; overrides `BRRTG_SESSION_MAX_INACTIVE_SECS`
    pub max_inactive_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormLoginSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub login_page: Option<String>,
    pub login_processing_url: Option<String>,
    pub default_success_url: Option<String>,
    pub failure_url: Option<String>,
    pub username_parameter: Option<String>,
    pub password_parameter: Option<String>,
    pub serve_login_page: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpBasicSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub realm: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnonymousSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for AnonymousSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorizeRule {
    pub pattern: String,
    #[serde(default)]
    pub methods: Vec<String>,
    pub access: Access,
}

fn parse_methods(names: &[String]) -> Result<Vec<Method>, ConfigError> {
    names
        .iter()
        .map(|name| {
            Method::from_bytes(name.to_ascii_uppercase().as_bytes())
                .map_err(|_| ConfigError::InvalidMethod { method: name.clone() })
        })
        .collect()
}

impl GuardConfig {
    /// Read and parse a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("Failed to parse configuration")
    }

    /// Apply environment overrides
    pub fn apply_runtime(&mut self, runtime: &RuntimeConfig) {
        if let Some(cookie) = &runtime.session_cookie {
            self.session.cookie_name = Some(cookie.clone());
        }
        if self.session.max_inactive_secs.is_none() {
            self.session.max_inactive_secs = Some(runtime.session_max_inactive.as_secs());
        }
    }

    /// Collaborators described by the file: CORS source, dispatch routes, users, session store
    pub fn shared_context(&self) -> Result<SharedContext, ConfigError> {
        let mut store = InMemorySessionStore::new();
        if let Some(secs) = self.session.max_inactive_secs {
            store = store.max_inactive_interval(Duration::from_secs(secs));
        }
        let mut shared = SharedContext::new().with_session_store(Arc::new(store));

        if let Some(cors) = &self.cors {
            if !cors.configurations.is_empty() {
                let mut source = UrlBasedCorsConfigurationSource::new();
                for (pattern, settings) in &cors.configurations {
                    source.register(pattern, settings.to_builder().build()?)?;
                }
                shared = shared.with_cors_configuration_source(Arc::new(source));
            }
        }

        if let Some(dispatch) = &self.dispatch {
            let mut registry = RouteCorsRegistry::new(dispatch.global.to_builder().build()?);
            for route in &dispatch.routes {
                registry.route(&route.pattern, &parse_methods(&route.methods)?, route.cors.to_policy())?;
            }
            shared = shared.with_dispatch_integration(Arc::new(registry));
        }

        if !self.users.is_empty() {
            let users = InMemoryUserDetailsManager::new(self.users.iter().cloned());
            shared = shared.with_user_details(Arc::new(users));
        }
        Ok(shared)
    }

    /// Build the chain described by the file against `shared`
    pub fn build_chain(&self, shared: SharedContext) -> Result<SecurityFilterChain, ConfigError> {
        let mut builder = FilterChainBuilder::new(shared).security_matcher(self.security_matcher.clone());
        if self.tracing {
            builder = builder.tracing();
        }

        if let Some(cors) = &self.cors {
            let (enabled, reject) = (cors.enabled, cors.reject);
            builder = builder.cors(|c| {
                let c = c.reject_policy(reject);
                if enabled { c } else { c.disable() }
            });
        }

        let context = &self.security_context;
        builder = builder.security_context(|c| {
            let mut c = c.require_explicit_save(context.require_explicit_save);
            if context.repository == RepositoryKind::Stateless {
                c = c.security_context_repository(Arc::new(NullSecurityContextRepository));
            }
            if context.enabled { c } else { c.disable() }
        });

        let session = &self.session;
        builder = builder.session_management(|s| {
            let s = s.session_creation_policy(session.creation_policy);
            match &session.cookie_name {
                Some(name) => s.cookie_name(name.clone()),
                None => s,
            }
        });

        if let Some(form) = self.form_login.as_ref().filter(|f| f.enabled) {
            builder = builder.form_login(|mut f| {
                let optional = [
                    (&form.login_page, &mut f.settings.login_page),
                    (&form.login_processing_url, &mut f.settings.login_processing_url),
                    (&form.default_success_url, &mut f.settings.default_success_url),
                    (&form.failure_url, &mut f.settings.failure_url),
                    (&form.username_parameter, &mut f.settings.username_parameter),
                    (&form.password_parameter, &mut f.settings.password_parameter),
                ];
                for (value, target) in optional {
                    if let Some(value) = value {
                        target.clone_from(value);
                    }
                }
                if let Some(serve) = form.serve_login_page {
                    f.settings.serve_login_page = serve;
                }
                f
            });
        }

        if let Some(basic) = self.http_basic.as_ref().filter(|b| b.enabled) {
            builder = builder.http_basic(|b| match &basic.realm {
                Some(realm) => b.realm(realm.clone()),
                None => b,
            });
        }

        if !self.anonymous.enabled {
            builder = builder.anonymous(|a| a.disable());
        }

        if !self.authorize.is_empty() {
            let mut rules = Vec::with_capacity(self.authorize.len());
            for rule in &self.authorize {
                rules.push((parse_methods(&rule.methods)?, rule));
            }
            builder = builder.authorize_requests(|mut a| {
                for (methods, rule) in rules {
                    a = a.request_matchers_for(&methods, &rule.pattern, rule.access.clone());
                }
                a
            });
        }

        builder.build()
    }

    /// Compile the whole file into a ready-to-use proxy
    pub fn into_proxy(&self) -> Result<FilterChainProxy, ConfigError> {
        let chain = self.build_chain(self.shared_context()?)?;
        Ok(FilterChainProxy::new(vec![chain]))
    }
}

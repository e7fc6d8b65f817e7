use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use super::configurers::{
    AnonymousConfigurer, AuthorizeRequestsConfigurer, CorsConfigurer, FormLoginConfigurer,
    HttpBasicConfigurer, SecurityContextConfigurer, SessionCreationPolicy,
    SessionManagementConfigurer,
};
use super::filter_chain::{FilterChain, SecurityFilterChain};
use super::shared::SharedContext;
use crate::cors::{CorsConfigurationSource, CorsFilter, CorsPolicyResolver};
use crate::error::ConfigError;
use crate::filter::{
    AnonymousAuthenticationFilter, AuthenticationEntryPoint, AuthorizationFilter, Filter,
    FilterOrder, FormLoginFilter, HttpBasicFilter, MetricsFilter, RequestRule,
    SecurityContextHolderFilter, SecurityContextPersistenceFilter, TracingFilter,
};
use crate::matcher::PathPattern;
use crate::security::{
    AuthenticationManager, HttpSessionSecurityContextRepository, NullSecurityContextRepository,
    SecurityContextRepository,
};

/// Hook that sees every stage before it is placed in a chain
///
/// A post processor may return the stage unchanged, wrap it, or replace it.
/// Closures of type `Fn(Arc<dyn Filter>) -> Arc<dyn Filter>` implement it.
pub trait FilterPostProcessor: Send + Sync {
    fn post_process(&self, filter: Arc<dyn Filter>) -> Arc<dyn Filter>;
}

impl<F> FilterPostProcessor for F
where
    F: Fn(Arc<dyn Filter>) -> Arc<dyn Filter> + Send + Sync,
{
    fn post_process(&self, filter: Arc<dyn Filter>) -> Arc<dyn Filter> {
        self(filter)
    }
}

/// Assembles one [`SecurityFilterChain`]
///
/// Stages are placed by [`FilterOrder`], not by the order in which the
/// configurer methods are called. A stage added with
/// [`add_filter_at`](Self::add_filter_at) at the same order as a built-in
/// stage runs after it.
///
/// Defaults: the security-context stage (auto-save, repository chosen from
/// the session policy) and the anonymous stage are on; everything else is
/// off until configured.
///
/// # Example
///
/// ```ignore
/// let chain = FilterChainBuilder::new(shared)
///     .cors(|c| c)
///     .security_context(|c| c.require_explicit_save(true))
///     .form_login(|f| f)
///     .authorize_requests(|a| a.any_request(Access::Authenticated))
///     .build()?;
/// ```
pub struct FilterChainBuilder {
    shared: SharedContext,
    security_matcher: String,
    cors: Option<CorsConfigurer>,
    security_context: Option<SecurityContextConfigurer>,
    session_management: SessionManagementConfigurer,
    form_login: Option<FormLoginConfigurer>,
    http_basic: Option<HttpBasicConfigurer>,
    anonymous: Option<AnonymousConfigurer>,
    authorize_requests: Option<AuthorizeRequestsConfigurer>,
    additional: Vec<(FilterOrder, Arc<dyn Filter>)>,
    post_processors: Vec<Arc<dyn FilterPostProcessor>>,
    metrics: Option<Arc<MetricsFilter>>,
    tracing: bool,
}

impl FilterChainBuilder {
    pub fn new(shared: SharedContext) -> Self {
        Self {
            shared,
            security_matcher: "/**".to_string(),
            cors: None,
            security_context: Some(SecurityContextConfigurer::default()),
            session_management: SessionManagementConfigurer::default(),
            form_login: None,
            http_basic: None,
            anonymous: Some(AnonymousConfigurer::default()),
            authorize_requests: None,
            additional: Vec::new(),
            post_processors: Vec::new(),
            metrics: None,
            tracing: false,
        }
    }

    /// Requests this chain applies to; default `/**`
    pub fn security_matcher(mut self, pattern: impl Into<String>) -> Self {
        self.security_matcher = pattern.into();
        self
    }

    pub fn cors<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(CorsConfigurer) -> CorsConfigurer,
    {
        let current = self.cors.take().unwrap_or_default();
        self.cors = Some(configure(current));
        self
    }

    pub fn security_context<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(SecurityContextConfigurer) -> SecurityContextConfigurer,
    {
        let current = self.security_context.take().unwrap_or_default();
        self.security_context = Some(configure(current));
        self
    }

    pub fn session_management<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(SessionManagementConfigurer) -> SessionManagementConfigurer,
    {
        self.session_management = configure(std::mem::take(&mut self.session_management));
        self
    }

    pub fn form_login<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(FormLoginConfigurer) -> FormLoginConfigurer,
    {
        let current = self.form_login.take().unwrap_or_default();
        self.form_login = Some(configure(current));
        self
    }

    pub fn http_basic<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(HttpBasicConfigurer) -> HttpBasicConfigurer,
    {
        let current = self.http_basic.take().unwrap_or_default();
        self.http_basic = Some(configure(current));
        self
    }

    pub fn anonymous<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(AnonymousConfigurer) -> AnonymousConfigurer,
    {
        let current = self.anonymous.take().unwrap_or_default();
        self.anonymous = Some(configure(current));
        self
    }

    pub fn authorize_requests<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(AuthorizeRequestsConfigurer) -> AuthorizeRequestsConfigurer,
    {
        let current = self.authorize_requests.take().unwrap_or_default();
        self.authorize_requests = Some(configure(current));
        self
    }

    /// Insert a custom stage at `order`
    pub fn add_filter_at(mut self, filter: Arc<dyn Filter>, order: FilterOrder) -> Self {
        self.additional.push((order, filter));
        self
    }

    pub fn with_post_processor(mut self, processor: Arc<dyn FilterPostProcessor>) -> Self {
        self.post_processors.push(processor);
        self
    }

    /// Count requests with `metrics`; keep a clone of the `Arc` to read them
    pub fn with_metrics(mut self, metrics: Arc<MetricsFilter>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Wrap each request in a `request` span
    pub fn tracing(mut self) -> Self {
        self.tracing = true;
        self
    }

    /// Validate the configuration and assemble the chain
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingCorsIntegration`] when CORS is enabled and no
    ///   configuration source can be resolved
    /// - [`ConfigError::MissingUserDetailsService`] when form login or HTTP
    ///   Basic is enabled without a user store
    /// - [`ConfigError::InvalidPathPattern`] for a bad security matcher or
    ///   authorization pattern
    pub fn build(self) -> Result<SecurityFilterChain, ConfigError> {
        let FilterChainBuilder {
            shared,
            security_matcher,
            cors,
            security_context,
            session_management,
            form_login,
            http_basic,
            anonymous,
            authorize_requests,
            additional,
            post_processors,
            metrics,
            tracing,
        } = self;

        let matcher = PathPattern::parse(&security_matcher)?;
        let mut stages: Vec<(FilterOrder, Arc<dyn Filter>)> = Vec::new();

        if tracing {
            stages.push((FilterOrder::TRACING, Arc::new(TracingFilter) as Arc<dyn Filter>));
        }
        if let Some(metrics) = metrics {
            stages.push((FilterOrder::METRICS, metrics as Arc<dyn Filter>));
        }

        if let Some(cors) = cors.filter(|c| !c.disabled) {
            let source = resolve_cors_source(cors.source, &shared)?;
            let filter = CorsFilter::new(CorsPolicyResolver::new(source))
                .with_reject_policy(cors.reject_policy);
            stages.push((FilterOrder::CORS, Arc::new(filter) as Arc<dyn Filter>));
        }

        if let Some(context) = security_context.filter(|c| !c.disabled) {
            let repository = match context.repository {
                Some(repository) => repository,
                None => default_repository(&session_management, &shared),
            };
            debug!(
                repository = repository.name(),
                explicit_save = context.require_explicit_save,
                "security context stage configured"
            );
            let filter: Arc<dyn Filter> = if context.require_explicit_save {
                Arc::new(SecurityContextHolderFilter::new(repository))
            } else {
                Arc::new(SecurityContextPersistenceFilter::new(repository))
            };
            stages.push((FilterOrder::SECURITY_CONTEXT, filter));
        }

        let entry_point = match (&form_login, &http_basic) {
            (Some(form), _) => AuthenticationEntryPoint::LoginRedirect(form.settings.login_page.clone()),
            (None, Some(basic)) => AuthenticationEntryPoint::BasicChallenge {
                realm: basic.realm.clone(),
            },
            (None, None) => AuthenticationEntryPoint::Forbidden,
        };

        if let Some(form) = form_login {
            let manager = authentication_manager(&shared, FormLoginFilter::NAME)?;
            stages.push((
                FilterOrder::FORM_LOGIN,
                Arc::new(FormLoginFilter::new(form.settings, manager)) as Arc<dyn Filter>,
            ));
        }
        if let Some(basic) = http_basic {
            let manager = authentication_manager(&shared, HttpBasicFilter::NAME)?;
            stages.push((
                FilterOrder::HTTP_BASIC,
                Arc::new(HttpBasicFilter::new(basic.realm, manager)) as Arc<dyn Filter>,
            ));
        }
        if anonymous.is_some_and(|a| !a.disabled) {
            stages.push((
                FilterOrder::ANONYMOUS,
                Arc::new(AnonymousAuthenticationFilter) as Arc<dyn Filter>,
            ));
        }

        if let Some(authorize) = authorize_requests {
            let rules = authorize
                .rules
                .into_iter()
                .map(|rule| RequestRule::new(&rule.pattern, &rule.methods, rule.access))
                .collect::<Result<Vec<_>, _>>()?;
            stages.push((
                FilterOrder::AUTHORIZATION,
                Arc::new(AuthorizationFilter::new(rules, entry_point)) as Arc<dyn Filter>,
            ));
        }

        stages.extend(additional);
        // Stable: built-ins keep their place ahead of custom stages at the same order
        stages.sort_by_key(|(order, _)| *order);

        let filters = stages
            .into_iter()
            .map(|(_, filter)| {
                post_processors
                    .iter()
                    .fold(filter, |filter, processor| processor.post_process(filter))
            })
            .collect();
        let chain = FilterChain::new(filters);

        info!(
            security_matcher = matcher.as_str(),
            filters = ?chain.filter_names(),
            session_cookie = %session_management.cookie_name,
            "security filter chain built"
        );
        Ok(SecurityFilterChain::new(
            matcher,
            chain,
            Arc::from(session_management.cookie_name),
        ))
    }
}

impl fmt::Debug for FilterChainBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChainBuilder")
            .field("security_matcher", &self.security_matcher)
            .field("cors", &self.cors)
            .field("security_context", &self.security_context)
            .field("session_management", &self.session_management)
            .field("form_login", &self.form_login.is_some())
            .field("http_basic", &self.http_basic.is_some())
            .field("additional", &self.additional.len())
            .field("post_processors", &self.post_processors.len())
            .finish_non_exhaustive()
    }
}

/// Configurer source first, then the shared source, then the dispatch integration
fn resolve_cors_source(
    configured: Option<Arc<dyn CorsConfigurationSource>>,
    shared: &SharedContext,
) -> Result<Arc<dyn CorsConfigurationSource>, ConfigError> {
    if let Some(source) = configured {
        return Ok(source);
    }
    if let Some(source) = shared.cors_configuration_source() {
        return Ok(Arc::clone(source));
    }
    if let Some(registry) = shared.dispatch_integration() {
        debug!("CORS policies resolved through the dispatch integration");
        return Ok(Arc::clone(registry) as Arc<dyn CorsConfigurationSource>);
    }
    Err(ConfigError::MissingCorsIntegration)
}

fn default_repository(
    session: &SessionManagementConfigurer,
    shared: &SharedContext,
) -> Arc<dyn SecurityContextRepository> {
    match session.creation_policy {
        SessionCreationPolicy::Stateless => Arc::new(NullSecurityContextRepository),
        policy => Arc::new(
            HttpSessionSecurityContextRepository::new(Arc::clone(shared.session_store()))
                .allow_session_creation(policy != SessionCreationPolicy::Never)
                .always_create_session(policy == SessionCreationPolicy::Always),
        ),
    }
}

fn authentication_manager(
    shared: &SharedContext,
    stage: &'static str,
) -> Result<AuthenticationManager, ConfigError> {
    shared
        .user_details()
        .map(|users| AuthenticationManager::new(Arc::clone(users)))
        .ok_or(ConfigError::MissingUserDetailsService { stage })
}

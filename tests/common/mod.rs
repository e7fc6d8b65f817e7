#![allow(dead_code)]

//! Shared fixtures for the integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use parking_lot::Mutex;

use brrtguard::chain::SharedContext;
use brrtguard::cors::{CorsConfiguration, UrlBasedCorsConfigurationSource};
use brrtguard::exchange::{Exchange, HttpResponse};
use brrtguard::filter::{handler_fn, FilterError, Handler};
use brrtguard::security::{
    HttpSessionSecurityContextRepository, InMemorySessionStore, InMemoryUserDetailsManager,
    RepositoryError, SecurityContext, SecurityContextRepository, SessionStore, UserDetails,
};

pub const APP_ORIGIN: &str = "https://app.example.com";
pub const EVIL_ORIGIN: &str = "https://evil.example.com";

/// Repository wrapper counting every call made to it
pub struct CountingRepository {
    inner: Arc<dyn SecurityContextRepository>,
    name: &'static str,
    pub loads: AtomicUsize,
    pub saves: AtomicUsize,
    pub saved: Mutex<Vec<SecurityContext>>,
}

impl CountingRepository {
    pub fn wrap(inner: Arc<dyn SecurityContextRepository>) -> Arc<Self> {
        Self::named("counting", inner)
    }

    pub fn named(name: &'static str, inner: Arc<dyn SecurityContextRepository>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            name,
            loads: AtomicUsize::new(0),
            saves: AtomicUsize::new(0),
            saved: Mutex::new(Vec::new()),
        })
    }

    /// Session-backed repository over `store`, wrapped
    pub fn over_session(store: &Arc<InMemorySessionStore>) -> Arc<Self> {
        Self::wrap(Arc::new(HttpSessionSecurityContextRepository::new(
            Arc::clone(store) as Arc<dyn SessionStore>,
        )))
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl SecurityContextRepository for CountingRepository {
    fn name(&self) -> &'static str {
        self.name
    }

    fn load_context(&self, exchange: &Exchange) -> Result<SecurityContext, RepositoryError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load_context(exchange)
    }

    fn save_context(
        &self,
        context: &SecurityContext,
        exchange: &mut Exchange,
    ) -> Result<(), RepositoryError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.saved.lock().push(context.clone());
        self.inner.save_context(context, exchange)
    }

    fn contains_context(&self, exchange: &Exchange) -> Result<bool, RepositoryError> {
        self.inner.contains_context(exchange)
    }

    fn change_session_id(&self, exchange: &mut Exchange) -> Result<bool, RepositoryError> {
        self.inner.change_session_id(exchange)
    }
}

/// Repository whose backend is down
pub struct FailingRepository {
    pub fail_load: bool,
}

impl SecurityContextRepository for FailingRepository {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn load_context(&self, _exchange: &Exchange) -> Result<SecurityContext, RepositoryError> {
        if self.fail_load {
            Err(RepositoryError::backend(self.name(), "connection refused"))
        } else {
            Ok(SecurityContext::empty())
        }
    }

    fn save_context(
        &self,
        _context: &SecurityContext,
        _exchange: &mut Exchange,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::backend(self.name(), "connection refused"))
    }

    fn contains_context(&self, _exchange: &Exchange) -> Result<bool, RepositoryError> {
        Ok(false)
    }
}

pub fn users() -> Arc<InMemoryUserDetailsManager> {
    Arc::new(InMemoryUserDetailsManager::new([
        UserDetails::new("user", "password", &["USER"]),
        UserDetails::new("admin", "secret", &["USER", "ADMIN"]),
    ]))
}

pub fn app_cors() -> CorsConfiguration {
    CorsConfiguration::builder()
        .allowed_origins(&[APP_ORIGIN])
        .allowed_headers(&["Content-Type", "X-Requested-With"])
        .allow_credentials(true)
        .expose_headers(&["X-Total-Count"])
        .max_age(600)
        .build()
        .unwrap()
}

pub fn app_cors_source() -> Arc<UrlBasedCorsConfigurationSource> {
    Arc::new(
        UrlBasedCorsConfigurationSource::new()
            .with("/**", app_cors())
            .unwrap(),
    )
}

/// Shared context with users, an app CORS source and the given session store
pub fn shared(store: &Arc<InMemorySessionStore>) -> SharedContext {
    SharedContext::new()
        .with_session_store(Arc::clone(store) as Arc<dyn SessionStore>)
        .with_user_details(users())
        .with_cors_configuration_source(app_cors_source())
}

pub fn basic(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

/// `name=value` part of the first `Set-Cookie` header
pub fn session_cookie(response: &HttpResponse) -> Option<String> {
    response
        .get_header("set-cookie")
        .and_then(|c| c.split(';').next())
        .map(str::to_string)
}

/// Handler answering 200 with the current principal in the body
pub fn whoami() -> impl Handler {
    handler_fn(|exchange: &mut Exchange| {
        let principal = exchange
            .security_context()
            .authentication()
            .map(|a| a.principal().to_string());
        Ok(HttpResponse::json(200, serde_json::json!({ "principal": principal })))
    })
}

pub fn ok() -> impl Handler {
    handler_fn(|_exchange: &mut Exchange| Ok(HttpResponse::empty(200)))
}

/// Handler that counts its invocations
pub struct CountingHandler {
    pub calls: AtomicUsize,
}

impl CountingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Handler for CountingHandler {
    fn handle(&self, _exchange: &mut Exchange) -> Result<HttpResponse, FilterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(HttpResponse::empty(200))
    }
}

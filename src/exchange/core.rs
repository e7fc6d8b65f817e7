use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::debug;

use super::request::{HeaderVec, HttpRequest};
use super::response::HttpResponse;
use crate::cors::CorsDecision;
use crate::ids::SessionId;
use crate::security::{Authentication, RepositoryError, SecurityContext, SecurityContextRepository};

/// Lifecycle of the security context within one request
///
/// `NotLoaded → Loaded → (Saved | Discarded)`. In explicit-save mode the
/// context may be saved more than once before the stage exits; the state
/// stays `Saved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    NotLoaded,
    Loaded,
    Saved,
    Discarded,
}

/// Per-request execution context threaded through every stage
///
/// Owns the request, the security context, and everything a stage needs to
/// hand to a later stage. Created by the
/// [`FilterChainProxy`](crate::chain::FilterChainProxy) and dropped when the
/// response is produced, so nothing here outlives the request.
pub struct Exchange {
    request: HttpRequest,
    security_context: SecurityContext,
    context_state: ContextState,
    save_hook: Option<Arc<dyn SecurityContextRepository>>,
    repository: Option<Arc<dyn SecurityContextRepository>>,
    session_cookie: Arc<str>,
    session_id: Option<SessionId>,
    pending_headers: HeaderVec,
    applied: SmallVec<[&'static str; 8]>,
    cors_decision: Option<CorsDecision>,
}

impl Exchange {
    /// Start a new exchange; the session id is taken from the `session_cookie` cookie.
    pub fn new(request: HttpRequest, session_cookie: impl Into<Arc<str>>) -> Self {
        let session_cookie = session_cookie.into();
        let session_id = request
            .get_cookie(&session_cookie)
            .and_then(SessionId::from_cookie);
        Self {
            request,
            security_context: SecurityContext::empty(),
            context_state: ContextState::NotLoaded,
            save_hook: None,
            repository: None,
            session_cookie,
            session_id,
            pending_headers: HeaderVec::new(),
            applied: SmallVec::new(),
            cors_decision: None,
        }
    }

    #[inline]
    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    #[inline]
    pub fn security_context(&self) -> &SecurityContext {
        &self.security_context
    }

    pub fn security_context_mut(&mut self) -> &mut SecurityContext {
        &mut self.security_context
    }

    /// Replace the current authentication
    pub fn set_authentication(&mut self, authentication: Authentication) {
        self.security_context.set_authentication(authentication);
    }

    #[inline]
    pub fn context_state(&self) -> ContextState {
        self.context_state
    }

    /// Record the loaded context and the repository it came from
    pub(crate) fn mark_loaded(
        &mut self,
        context: SecurityContext,
        repository: Arc<dyn SecurityContextRepository>,
    ) {
        self.security_context = context;
        self.context_state = ContextState::Loaded;
        self.repository = Some(repository);
    }

    pub(crate) fn mark_saved(&mut self) {
        self.context_state = ContextState::Saved;
    }

    pub(crate) fn mark_discarded(&mut self) {
        self.context_state = ContextState::Discarded;
    }

    pub(crate) fn install_save_hook(&mut self, repository: Arc<dyn SecurityContextRepository>) {
        self.save_hook = Some(repository);
    }

    pub(crate) fn remove_save_hook(&mut self) -> Option<Arc<dyn SecurityContextRepository>> {
        self.save_hook.take()
    }

    /// Whether an explicit-save stage is active for this request
    pub fn has_save_hook(&self) -> bool {
        self.save_hook.is_some()
    }

    /// Persist the current context through the explicit-save hook
    ///
    /// Returns `Ok(false)` when no hook is installed, which is the case in
    /// legacy auto-save mode (the propagation stage saves on exit) and in
    /// chains without a context stage.
    pub fn save_security_context(&mut self) -> Result<bool, RepositoryError> {
        let Some(repository) = self.save_hook.as_ref().map(Arc::clone) else {
            return Ok(false);
        };
        let context = self.security_context.clone();
        repository.save_context(&context, self)?;
        self.context_state = ContextState::Saved;
        debug!(
            request_id = %self.request.request_id,
            repository = repository.name(),
            "security context saved explicitly"
        );
        Ok(true)
    }

    /// Rotate the session identifier before an authentication is stored
    ///
    /// Delegates to the repository that loaded the context. Returns
    /// `Ok(false)` when no context stage ran or there was no session to move.
    pub fn change_session_id(&mut self) -> Result<bool, RepositoryError> {
        let Some(repository) = self.repository.as_ref().map(Arc::clone) else {
            return Ok(false);
        };
        repository.change_session_id(self)
    }

    /// Session id from the request cookie, or one bound during this request
    #[inline]
    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    pub fn session_cookie_name(&self) -> &str {
        &self.session_cookie
    }

    /// Attach a newly created session to this request and queue its cookie
    pub fn bind_session(&mut self, id: SessionId) {
        self.session_id = Some(id);
        let prefix = format!("{}=", self.session_cookie);
        self.pending_headers
            .retain(|(k, v)| !(k.eq_ignore_ascii_case("set-cookie") && v.starts_with(&prefix)));
        self.pending_headers.push((
            Arc::from("set-cookie"),
            format!("{prefix}{id}; Path=/; HttpOnly"),
        ));
    }

    /// Queue a header for whatever response eventually leaves the chain
    pub fn add_pending_header(&mut self, name: &str, value: String) {
        self.pending_headers.push((Arc::from(name), value));
    }

    pub fn pending_headers(&self) -> &HeaderVec {
        &self.pending_headers
    }

    /// Record that a once-per-request stage has run
    ///
    /// Returns `false` when `marker` was already recorded.
    pub fn mark_applied(&mut self, marker: &'static str) -> bool {
        if self.applied.contains(&marker) {
            return false;
        }
        self.applied.push(marker);
        true
    }

    pub fn is_applied(&self, marker: &str) -> bool {
        self.applied.iter().any(|m| *m == marker)
    }

    pub fn cors_decision(&self) -> Option<&CorsDecision> {
        self.cors_decision.as_ref()
    }

    pub(crate) fn set_cors_decision(&mut self, decision: CorsDecision) {
        self.cors_decision = Some(decision);
    }

    /// Merge pending headers into the outgoing response
    pub fn finish(self, mut response: HttpResponse) -> HttpResponse {
        for (name, value) in self.pending_headers {
            response.append_header(name, value);
        }
        response
    }
}

impl fmt::Debug for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange")
            .field("request_id", &self.request.request_id)
            .field("method", &self.request.method)
            .field("path", &self.request.path)
            .field("context_state", &self.context_state)
            .field("authenticated", &self.security_context.is_authenticated())
            .field("session_id", &self.session_id)
            .field("save_hook", &self.save_hook.as_ref().map(|r| r.name()))
            .field("applied", &self.applied)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::NullSecurityContextRepository;

    #[test]
    fn test_session_id_from_cookie() {
        let id = SessionId::generate();
        let req = HttpRequest::get("/").with_header("Cookie", format!("JSESSION={id}"));
        assert_eq!(Exchange::new(req.clone(), "JSESSION").session_id(), Some(id));
        assert_eq!(Exchange::new(req, "SESSION").session_id(), None);
    }

    #[test]
    fn test_save_without_hook_is_noop() {
        let mut ex = Exchange::new(HttpRequest::get("/"), "SESSION");
        assert_eq!(ex.save_security_context(), Ok(false));
        assert_eq!(ex.context_state(), ContextState::NotLoaded);
    }

    #[test]
    fn test_save_with_hook_marks_saved() {
        let mut ex = Exchange::new(HttpRequest::get("/"), "SESSION");
        ex.mark_loaded(SecurityContext::empty(), Arc::new(NullSecurityContextRepository));
        ex.install_save_hook(Arc::new(NullSecurityContextRepository));
        assert_eq!(ex.save_security_context(), Ok(true));
        assert_eq!(ex.context_state(), ContextState::Saved);
    }

    #[test]
    fn test_change_session_id_without_context_stage_is_noop() {
        let id = SessionId::generate();
        let req = HttpRequest::get("/").with_cookie("SESSION", id.to_string());
        let mut ex = Exchange::new(req, "SESSION");
        assert_eq!(ex.change_session_id(), Ok(false));
        assert_eq!(ex.session_id(), Some(id));
    }

    #[test]
    fn test_mark_applied_once() {
        let mut ex = Exchange::new(HttpRequest::get("/"), "SESSION");
        assert!(ex.mark_applied("security_context"));
        assert!(!ex.mark_applied("security_context"));
        assert!(ex.is_applied("security_context"));
    }

    #[test]
    fn test_rebinding_session_replaces_cookie() {
        let mut ex = Exchange::new(HttpRequest::get("/"), "SESSION");
        ex.bind_session(SessionId::generate());
        let second = SessionId::generate();
        ex.bind_session(second);
        let response = ex.finish(HttpResponse::empty(200));
        let cookies: Vec<_> = response.get_all_headers("set-cookie").collect();
        assert_eq!(cookies, vec![format!("SESSION={second}; Path=/; HttpOnly")]);
    }
}

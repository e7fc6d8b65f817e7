use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use super::context::SecurityContext;
use super::session::SessionStore;
use crate::exchange::Exchange;

/// Failure of a context repository or its backing session store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// The backing store could not be read or written
    Backend {
        /// Repository that reported the failure
        repository: &'static str,
        /// Store diagnostic
        message: String,
    },
}

impl RepositoryError {
    pub fn backend(repository: &'static str, message: impl Into<String>) -> Self {
        RepositoryError::Backend {
            repository,
            message: message.into(),
        }
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryError::Backend {
                repository,
                message,
            } => write!(f, "security context repository '{repository}' failed: {message}"),
        }
    }
}

impl std::error::Error for RepositoryError {}

/// Strategy for loading and persisting a [`SecurityContext`] across requests
///
/// Implementations are shared by every request and must be stateless with
/// respect to any single request: everything request-specific lives in the
/// [`Exchange`].
///
/// Only the propagation stages call [`load_context`](Self::load_context), and
/// they guarantee it runs at most once per request.
pub trait SecurityContextRepository: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &'static str;

    /// Load the context for this request; an empty context when nothing was stored
    fn load_context(&self, exchange: &Exchange) -> Result<SecurityContext, RepositoryError>;

    /// Persist `context` so that later requests can load it
    fn save_context(
        &self,
        context: &SecurityContext,
        exchange: &mut Exchange,
    ) -> Result<(), RepositoryError>;

    /// Whether a stored context exists for this request
    fn contains_context(&self, exchange: &Exchange) -> Result<bool, RepositoryError>;

    /// Move the request's stored state to a new identifier before a login is saved
    ///
    /// Returns whether anything was moved. Repositories that keep nothing
    /// between requests have nothing to rotate.
    fn change_session_id(&self, _exchange: &mut Exchange) -> Result<bool, RepositoryError> {
        Ok(false)
    }
}

/// Stores the context as an attribute of the server-side session
///
/// The session is identified by the session cookie, or by a session created
/// earlier in the same request. Loading never creates a session; saving only
/// creates one for a context worth keeping.
pub struct HttpSessionSecurityContextRepository {
    store: Arc<dyn SessionStore>,
    allow_session_creation: bool,
    always_create_session: bool,
}

impl HttpSessionSecurityContextRepository {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            allow_session_creation: true,
            always_create_session: false,
        }
    }

    /// Whether `save_context` may create a session that does not exist yet
    ///
    /// Default: `true`
    pub fn allow_session_creation(mut self, allow: bool) -> Self {
        self.allow_session_creation = allow;
        self
    }

    /// Create a session on save even when the context is not worth keeping
    ///
    /// Default: `false`. Has no effect when session creation is disallowed.
    pub fn always_create_session(mut self, always: bool) -> Self {
        self.always_create_session = always;
        self
    }

    pub fn session_store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }
}

impl SecurityContextRepository for HttpSessionSecurityContextRepository {
    fn name(&self) -> &'static str {
        "http_session"
    }

    fn load_context(&self, exchange: &Exchange) -> Result<SecurityContext, RepositoryError> {
        let Some(session_id) = exchange.session_id() else {
            debug!(request_id = %exchange.request().request_id, "no session, empty security context");
            return Ok(SecurityContext::empty());
        };
        let context = self.store.get_context(&session_id)?.unwrap_or_default();
        debug!(
            request_id = %exchange.request().request_id,
            session_id = %session_id,
            authenticated = context.is_authenticated(),
            "security context loaded from session"
        );
        Ok(context)
    }

    fn save_context(
        &self,
        context: &SecurityContext,
        exchange: &mut Exchange,
    ) -> Result<(), RepositoryError> {
        if let Some(session_id) = exchange.session_id() {
            if self.store.exists(&session_id)? {
                if context.is_persistable() {
                    self.store.put_context(&session_id, context.clone())?;
                    debug!(session_id = %session_id, "security context stored in session");
                } else {
                    self.store.remove_context(&session_id)?;
                    debug!(session_id = %session_id, "security context removed from session");
                }
                return Ok(());
            }
        }

        if !context.is_persistable() && !self.always_create_session {
            return Ok(());
        }
        if !self.allow_session_creation {
            warn!(
                request_id = %exchange.request().request_id,
                "session creation disallowed, security context not stored"
            );
            return Ok(());
        }

        let session_id = self.store.create()?;
        exchange.bind_session(session_id);
        if !context.is_persistable() {
            debug!(session_id = %session_id, "session created eagerly");
            return Ok(());
        }
        if !self.store.put_context(&session_id, context.clone())? {
            return Err(RepositoryError::backend(
                self.name(),
                format!("session {session_id} vanished before the context was stored"),
            ));
        }
        debug!(session_id = %session_id, "session created for security context");
        Ok(())
    }

    fn contains_context(&self, exchange: &Exchange) -> Result<bool, RepositoryError> {
        match exchange.session_id() {
            Some(id) => Ok(self.store.get_context(&id)?.is_some()),
            None => Ok(false),
        }
    }

    fn change_session_id(&self, exchange: &mut Exchange) -> Result<bool, RepositoryError> {
        let Some(old_id) = exchange.session_id() else {
            return Ok(false);
        };
        let Some(new_id) = self.store.change_id(&old_id)? else {
            return Ok(false);
        };
        exchange.bind_session(new_id);
        debug!(
            request_id = %exchange.request().request_id,
            session_id = %new_id,
            "session id rotated"
        );
        Ok(true)
    }
}

/// Stateless repository: always loads an empty context and never stores one
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSecurityContextRepository;

impl SecurityContextRepository for NullSecurityContextRepository {
    fn name(&self) -> &'static str {
        "null"
    }

    fn load_context(&self, _exchange: &Exchange) -> Result<SecurityContext, RepositoryError> {
        Ok(SecurityContext::empty())
    }

    fn save_context(
        &self,
        _context: &SecurityContext,
        _exchange: &mut Exchange,
    ) -> Result<(), RepositoryError> {
        Ok(())
    }

    fn contains_context(&self, _exchange: &Exchange) -> Result<bool, RepositoryError> {
        Ok(false)
    }
}

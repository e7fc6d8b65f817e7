use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use super::context::SecurityContext;
use super::repository::RepositoryError;
use crate::ids::SessionId;

/// Server-side session storage
///
/// Shared by every request, so implementations must tolerate concurrent
/// access. Fallible so that remote stores can surface I/O failures through
/// the repository instead of panicking.
pub trait SessionStore: Send + Sync {
    /// Create a new, empty session
    fn create(&self) -> Result<SessionId, RepositoryError>;

    /// Whether the session exists and has not expired
    fn exists(&self, id: &SessionId) -> Result<bool, RepositoryError>;

    /// Security context stored in the session, if any
    fn get_context(&self, id: &SessionId) -> Result<Option<SecurityContext>, RepositoryError>;

    /// Store a context; returns `false` when the session no longer exists
    fn put_context(&self, id: &SessionId, context: SecurityContext) -> Result<bool, RepositoryError>;

    /// Drop the context attribute but keep the session
    fn remove_context(&self, id: &SessionId) -> Result<(), RepositoryError>;

    /// Destroy the session
    fn invalidate(&self, id: &SessionId) -> Result<(), RepositoryError>;

    /// Move a live session, context included, to a freshly generated id
    ///
    /// The old id stops resolving. Returns `None` when `id` is unknown or expired.
    fn change_id(&self, id: &SessionId) -> Result<Option<SessionId>, RepositoryError>;
}

/// Idle timeout applied unless [`InMemorySessionStore::max_inactive_interval`] says otherwise
pub const DEFAULT_MAX_INACTIVE: Duration = Duration::from_secs(1800);

/// Expired sessions are swept once every this many `create` calls
const SWEEP_EVERY: usize = 256;

struct Session {
    context: Option<SecurityContext>,
    last_accessed: Instant,
}

/// In-memory session store with idle expiry
///
/// Sessions live in a `DashMap`. An expired entry is evicted when it is next
/// touched, and every 256 creations a `retain` pass drops the
/// expired sessions nobody came back for.
pub struct InMemorySessionStore {
    sessions: DashMap<SessionId, Session>,
    max_inactive: Option<Duration>,
    created: AtomicUsize,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            max_inactive: Some(DEFAULT_MAX_INACTIVE),
            created: AtomicUsize::new(0),
        }
    }

    /// Expire sessions idle for longer than `interval`
    ///
    /// Default: [`DEFAULT_MAX_INACTIVE`]
    pub fn max_inactive_interval(mut self, interval: Duration) -> Self {
        self.max_inactive = Some(interval);
        self
    }

    /// Keep sessions until they are invalidated
    pub fn without_expiry(mut self) -> Self {
        self.max_inactive = None;
        self
    }

    /// Drop every expired session; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let Some(max) = self.max_inactive else {
            return 0;
        };
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| session.last_accessed.elapsed() <= max);
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            debug!(removed, remaining = self.sessions.len(), "expired sessions purged");
        }
        removed
    }

    /// Number of held sessions (expired ones count until touched or swept)
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn is_expired(&self, session: &Session) -> bool {
        self.max_inactive
            .is_some_and(|max| session.last_accessed.elapsed() > max)
    }

    /// Remove `id` if it has expired; returns whether it is still live.
    fn touch(&self, id: &SessionId) -> bool {
        let expired = match self.sessions.get_mut(id) {
            None => return false,
            Some(mut session) => {
                if self.is_expired(&session) {
                    true
                } else {
                    session.last_accessed = Instant::now();
                    false
                }
            }
        };
        if expired {
            debug!(session_id = %id, "session expired");
            self.sessions.remove(id);
        }
        !expired
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&self) -> Result<SessionId, RepositoryError> {
        if self.created.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.purge_expired();
        }
        let id = SessionId::generate();
        self.sessions.insert(
            id,
            Session {
                context: None,
                last_accessed: Instant::now(),
            },
        );
        debug!(session_id = %id, "session created");
        Ok(id)
    }

    fn exists(&self, id: &SessionId) -> Result<bool, RepositoryError> {
        Ok(self.touch(id))
    }

    fn get_context(&self, id: &SessionId) -> Result<Option<SecurityContext>, RepositoryError> {
        if !self.touch(id) {
            return Ok(None);
        }
        Ok(self.sessions.get(id).and_then(|s| s.context.clone()))
    }

    fn put_context(&self, id: &SessionId, context: SecurityContext) -> Result<bool, RepositoryError> {
        if !self.touch(id) {
            return Ok(false);
        }
        match self.sessions.get_mut(id) {
            Some(mut session) => {
                session.context = Some(context);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove_context(&self, id: &SessionId) -> Result<(), RepositoryError> {
        if let Some(mut session) = self.sessions.get_mut(id) {
            session.context = None;
        }
        Ok(())
    }

    fn invalidate(&self, id: &SessionId) -> Result<(), RepositoryError> {
        self.sessions.remove(id);
        Ok(())
    }

    fn change_id(&self, id: &SessionId) -> Result<Option<SessionId>, RepositoryError> {
        if !self.touch(id) {
            return Ok(None);
        }
        let Some((_, session)) = self.sessions.remove(id) else {
            return Ok(None);
        };
        let new_id = SessionId::generate();
        self.sessions.insert(new_id, session);
        debug!(old_session_id = %id, session_id = %new_id, "session id changed");
        Ok(Some(new_id))
    }
}

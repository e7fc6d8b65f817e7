use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use subtle::ConstantTimeEq;
use tracing::debug;

use super::context::{Authentication, AuthenticationKind};

/// A user known to the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserDetails {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

fn enabled_default() -> bool {
    true
}

impl UserDetails {
    pub fn new(username: impl Into<String>, password: impl Into<String>, roles: &[&str]) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            enabled: true,
        }
    }

    /// Roles expressed as `ROLE_`-prefixed authorities
    pub fn authorities(&self) -> Vec<String> {
        self.roles
            .iter()
            .map(|r| {
                if r.starts_with("ROLE_") {
                    r.clone()
                } else {
                    format!("ROLE_{r}")
                }
            })
            .collect()
    }
}

/// Lookup of users by name
pub trait UserDetailsService: Send + Sync {
    fn load_user(&self, username: &str) -> Option<UserDetails>;
}

/// Fixed set of users held in memory
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserDetailsManager {
    users: HashMap<String, UserDetails>,
}

impl InMemoryUserDetailsManager {
    pub fn new(users: impl IntoIterator<Item = UserDetails>) -> Self {
        Self {
            users: users
                .into_iter()
                .map(|u| (u.username.clone(), u))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl UserDetailsService for InMemoryUserDetailsManager {
    fn load_user(&self, username: &str) -> Option<UserDetails> {
        self.users.get(username).cloned()
    }
}

/// Why a credential check failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticationError {
    /// Unknown user or wrong password
    BadCredentials,
    /// The account exists but is disabled
    Disabled,
}

impl fmt::Display for AuthenticationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthenticationError::BadCredentials => write!(f, "Bad credentials"),
            AuthenticationError::Disabled => write!(f, "User is disabled"),
        }
    }
}

impl std::error::Error for AuthenticationError {}

/// Verifies username/password pairs against a [`UserDetailsService`]
#[derive(Clone)]
pub struct AuthenticationManager {
    users: Arc<dyn UserDetailsService>,
}

impl AuthenticationManager {
    pub fn new(users: Arc<dyn UserDetailsService>) -> Self {
        Self { users }
    }

    pub fn authenticate(
        &self,
        username: &str,
        password: &str,
        kind: AuthenticationKind,
    ) -> Result<Authentication, AuthenticationError> {
        let user = self
            .users
            .load_user(username)
            .ok_or(AuthenticationError::BadCredentials)?;
        if !constant_time_eq(user.password.as_bytes(), password.as_bytes()) {
            debug!(username, "password mismatch");
            return Err(AuthenticationError::BadCredentials);
        }
        if !user.enabled {
            return Err(AuthenticationError::Disabled);
        }
        Ok(Authentication::authenticated(
            user.username.clone(),
            user.authorities(),
            kind,
        ))
    }
}

impl fmt::Debug for AuthenticationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationManager").finish_non_exhaustive()
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

use serde::{Deserialize, Serialize};

/// Principal name given to anonymous requests
pub const ANONYMOUS_PRINCIPAL: &str = "anonymousUser";
/// Authority granted to anonymous requests
pub const ANONYMOUS_AUTHORITY: &str = "ROLE_ANONYMOUS";

/// How an [`Authentication`] was established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationKind {
    FormLogin,
    HttpBasic,
    Anonymous,
    /// Established outside the pipeline (tests, upstream gateways)
    PreAuthenticated,
}

/// An authenticated (or anonymous) principal together with its authorities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authentication {
    principal: String,
    authorities: Vec<String>,
    authenticated: bool,
    kind: AuthenticationKind,
}

impl Authentication {
    pub fn authenticated(
        principal: impl Into<String>,
        authorities: Vec<String>,
        kind: AuthenticationKind,
    ) -> Self {
        Self {
            principal: principal.into(),
            authorities,
            authenticated: true,
            kind,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            principal: ANONYMOUS_PRINCIPAL.to_string(),
            authorities: vec![ANONYMOUS_AUTHORITY.to_string()],
            authenticated: true,
            kind: AuthenticationKind::Anonymous,
        }
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn authorities(&self) -> &[String] {
        &self.authorities
    }

    pub fn kind(&self) -> AuthenticationKind {
        self.kind
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn is_anonymous(&self) -> bool {
        self.kind == AuthenticationKind::Anonymous
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a == authority)
    }

    /// Role check; `has_role("ADMIN")` looks for the `ROLE_ADMIN` authority.
    pub fn has_role(&self, role: &str) -> bool {
        if role.starts_with("ROLE_") {
            self.has_authority(role)
        } else {
            self.authorities
                .iter()
                .any(|a| a.strip_prefix("ROLE_") == Some(role))
        }
    }
}

/// Per-request holder of the current [`Authentication`]
///
/// Created empty at request start when nothing was persisted, populated by
/// authentication stages, read by authorization, and persisted (or not) when
/// the request ends. Never shared between requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityContext {
    authentication: Option<Authentication>,
}

impl SecurityContext {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_authentication(authentication: Authentication) -> Self {
        Self {
            authentication: Some(authentication),
        }
    }

    pub fn authentication(&self) -> Option<&Authentication> {
        self.authentication.as_ref()
    }

    pub fn set_authentication(&mut self, authentication: Authentication) {
        self.authentication = Some(authentication);
    }

    pub fn clear(&mut self) {
        self.authentication = None;
    }

    pub fn is_empty(&self) -> bool {
        self.authentication.is_none()
    }

    /// True only for a real, non-anonymous principal
    pub fn is_authenticated(&self) -> bool {
        self.authentication
            .as_ref()
            .is_some_and(|a| a.is_authenticated() && !a.is_anonymous())
    }

    /// Whether a session repository should keep this context
    ///
    /// Empty and anonymous contexts are never worth a session.
    pub fn is_persistable(&self) -> bool {
        self.authentication
            .as_ref()
            .is_some_and(|a| !a.is_anonymous())
    }
}

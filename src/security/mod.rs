//! Security context, its persistence, and the user store behind authentication.

mod context;
mod repository;
mod session;
mod users;

pub use context::{
    Authentication, AuthenticationKind, SecurityContext, ANONYMOUS_AUTHORITY, ANONYMOUS_PRINCIPAL,
};
pub use repository::{
    HttpSessionSecurityContextRepository, NullSecurityContextRepository, RepositoryError,
    SecurityContextRepository,
};
pub use session::{InMemorySessionStore, SessionStore, DEFAULT_MAX_INACTIVE};
pub use users::{
    AuthenticationError, AuthenticationManager, InMemoryUserDetailsManager, UserDetails,
    UserDetailsService,
};

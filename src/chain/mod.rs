//! Chain assembly and request entry.
//!
//! [`FilterChainBuilder`] turns configurers and the [`SharedContext`] into a
//! [`SecurityFilterChain`]; [`FilterChainProxy`] selects a chain per request
//! and runs it.

mod builder;
mod configurers;
mod filter_chain;
mod proxy;
mod shared;

pub use builder::{FilterChainBuilder, FilterPostProcessor};
pub use configurers::{
    AnonymousConfigurer, AuthorizeRequestsConfigurer, CorsConfigurer, FormLoginConfigurer,
    HttpBasicConfigurer, SecurityContextConfigurer, SessionCreationPolicy,
    SessionManagementConfigurer,
};
pub use filter_chain::{FilterChain, SecurityFilterChain};
pub use proxy::FilterChainProxy;
pub use shared::SharedContext;

//! Pipeline stages and the [`Filter`] trait they implement.

mod anonymous;
mod authorization;
mod basic;
mod context;
mod core;
mod form_login;
mod metrics;
mod tracing;

pub use self::core::{handler_fn, Filter, FilterError, FilterOrder, FnHandler, Handler, Next};
pub use self::tracing::TracingFilter;
pub use anonymous::AnonymousAuthenticationFilter;
pub use authorization::{Access, AuthenticationEntryPoint, AuthorizationFilter, RequestRule};
pub use basic::{basic_challenge, HttpBasicFilter};
pub use context::{SecurityContextHolderFilter, SecurityContextPersistenceFilter};
pub use form_login::{FormLoginFilter, FormLoginSettings};
pub use metrics::MetricsFilter;

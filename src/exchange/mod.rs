//! Request, response, and the per-request [`Exchange`] passed between stages.

mod core;
mod request;
mod response;

pub use self::core::{ContextState, Exchange};
pub use request::{HeaderVec, HttpRequest, MAX_INLINE_HEADERS};
pub use response::HttpResponse;

use std::fmt;
use std::sync::Arc;

use crate::exchange::{Exchange, HttpResponse};
use crate::security::RepositoryError;

/// Failure that aborts a request inside the pipeline
///
/// Authentication and authorization failures are not errors: stages answer
/// them with a response. A `FilterError` means the request could not be
/// processed at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// The security context could not be loaded or saved
    Repository(RepositoryError),
    /// The business handler failed
    Handler { message: String },
}

impl FilterError {
    pub fn handler(message: impl Into<String>) -> Self {
        FilterError::Handler {
            message: message.into(),
        }
    }
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::Repository(e) => write!(f, "{e}"),
            FilterError::Handler { message } => write!(f, "handler failed: {message}"),
        }
    }
}

impl std::error::Error for FilterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FilterError::Repository(e) => Some(e),
            FilterError::Handler { .. } => None,
        }
    }
}

impl From<RepositoryError> for FilterError {
    fn from(e: RepositoryError) -> Self {
        FilterError::Repository(e)
    }
}

/// Position of a stage in a chain; lower runs first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FilterOrder(pub i32);

impl FilterOrder {
    pub const TRACING: FilterOrder = FilterOrder(0);
    pub const METRICS: FilterOrder = FilterOrder(50);
    pub const CORS: FilterOrder = FilterOrder(100);
    pub const SECURITY_CONTEXT: FilterOrder = FilterOrder(200);
    pub const FORM_LOGIN: FilterOrder = FilterOrder(300);
    pub const HTTP_BASIC: FilterOrder = FilterOrder(400);
    pub const ANONYMOUS: FilterOrder = FilterOrder(500);
    pub const AUTHORIZATION: FilterOrder = FilterOrder(600);
}

/// One stage of a filter chain
///
/// A stage either produces a response itself (short-circuit) or delegates to
/// the rest of the chain through `next`, optionally acting on the response
/// that comes back. Stages are shared by concurrent requests and hold no
/// per-request state; anything request-scoped goes into the [`Exchange`].
pub trait Filter: Send + Sync {
    /// Stable name, used for logging and for inspecting a built chain
    fn name(&self) -> &'static str;

    fn filter(&self, exchange: &mut Exchange, next: Next<'_>) -> Result<HttpResponse, FilterError>;
}

/// The business handler at the end of a chain
pub trait Handler: Send + Sync {
    fn handle(&self, exchange: &mut Exchange) -> Result<HttpResponse, FilterError>;
}

/// Adapter turning a closure into a [`Handler`]
pub struct FnHandler<F>(F);

/// Wrap a closure as a [`Handler`]
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&mut Exchange) -> Result<HttpResponse, FilterError> + Send + Sync,
{
    FnHandler(f)
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&mut Exchange) -> Result<HttpResponse, FilterError> + Send + Sync,
{
    fn handle(&self, exchange: &mut Exchange) -> Result<HttpResponse, FilterError> {
        (self.0)(exchange)
    }
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn handle(&self, exchange: &mut Exchange) -> Result<HttpResponse, FilterError> {
        (**self).handle(exchange)
    }
}

/// The remainder of a chain, from the current stage's point of view
#[derive(Clone, Copy)]
pub struct Next<'a> {
    filters: &'a [Arc<dyn Filter>],
    handler: &'a dyn Handler,
}

impl<'a> Next<'a> {
    pub(crate) fn new(filters: &'a [Arc<dyn Filter>], handler: &'a dyn Handler) -> Self {
        Self { filters, handler }
    }

    /// Run the remaining stages and then the handler
    pub fn run(self, exchange: &mut Exchange) -> Result<HttpResponse, FilterError> {
        match self.filters.split_first() {
            Some((first, rest)) => first.filter(exchange, Next::new(rest, self.handler)),
            None => self.handler.handle(exchange),
        }
    }

    /// Number of stages still ahead
    pub fn remaining(&self) -> usize {
        self.filters.len()
    }
}

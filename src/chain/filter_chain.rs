use std::fmt;
use std::sync::Arc;

use crate::exchange::{Exchange, HttpResponse};
use crate::filter::{Filter, FilterError, Handler, Next};
use crate::matcher::PathPattern;

/// An ordered, immutable sequence of stages
///
/// Built once and shared by every request; cloning only bumps a reference
/// count.
#[derive(Clone)]
pub struct FilterChain {
    filters: Arc<[Arc<dyn Filter>]>,
}

impl FilterChain {
    pub fn new(filters: Vec<Arc<dyn Filter>>) -> Self {
        Self {
            filters: filters.into(),
        }
    }

    pub fn filters(&self) -> &[Arc<dyn Filter>] {
        &self.filters
    }

    /// Stage names in execution order
    pub fn filter_names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.iter().any(|f| f.name() == name)
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Run `exchange` through every stage and then `handler`
    pub fn execute(
        &self,
        exchange: &mut Exchange,
        handler: &dyn Handler,
    ) -> Result<HttpResponse, FilterError> {
        Next::new(&self.filters, handler).run(exchange)
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.filter_names()).finish()
    }
}

/// A [`FilterChain`] together with the requests it applies to
#[derive(Debug, Clone)]
pub struct SecurityFilterChain {
    matcher: PathPattern,
    chain: FilterChain,
    session_cookie: Arc<str>,
}

impl SecurityFilterChain {
    pub(crate) fn new(matcher: PathPattern, chain: FilterChain, session_cookie: Arc<str>) -> Self {
        Self {
            matcher,
            chain,
            session_cookie,
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        self.matcher.matches(path)
    }

    pub fn matcher(&self) -> &PathPattern {
        &self.matcher
    }

    pub fn chain(&self) -> &FilterChain {
        &self.chain
    }

    pub fn session_cookie(&self) -> &Arc<str> {
        &self.session_cookie
    }

    pub fn filter_names(&self) -> Vec<&'static str> {
        self.chain.filter_names()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.chain.contains(name)
    }
}

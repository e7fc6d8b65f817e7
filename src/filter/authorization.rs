use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use http::Method;
use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

use super::basic::basic_challenge;
use super::core::{Filter, FilterError, Next};
use crate::error::ConfigError;
use crate::exchange::{Exchange, HttpResponse};
use crate::matcher::PathPattern;
use crate::security::Authentication;

/// Access requirement of a request rule
///
/// Parsed from expressions such as `permit_all`, `authenticated`,
/// `has_role(ADMIN)` or `has_any_role(USER, ADMIN)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    PermitAll,
    DenyAll,
    /// Any non-anonymous authentication
    Authenticated,
    /// Only anonymous (or missing) authentication
    Anonymous,
    HasRole(String),
    HasAnyRole(Vec<String>),
    HasAuthority(String),
}

impl Access {
    /// Whether `authentication` satisfies this requirement
    pub fn is_granted(&self, authentication: Option<&Authentication>) -> bool {
        let real = authentication.filter(|a| a.is_authenticated() && !a.is_anonymous());
        match self {
            Access::PermitAll => true,
            Access::DenyAll => false,
            Access::Authenticated => real.is_some(),
            Access::Anonymous => real.is_none(),
            Access::HasRole(role) => real.is_some_and(|a| a.has_role(role)),
            Access::HasAnyRole(roles) => real.is_some_and(|a| roles.iter().any(|r| a.has_role(r))),
            Access::HasAuthority(authority) => real.is_some_and(|a| a.has_authority(authority)),
        }
    }
}

impl FromStr for Access {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidAccessExpression {
            expression: s.to_string(),
        };
        let expr = s.trim();
        match expr {
            "permit_all" => return Ok(Access::PermitAll),
            "deny_all" => return Ok(Access::DenyAll),
            "authenticated" => return Ok(Access::Authenticated),
            "anonymous" => return Ok(Access::Anonymous),
            _ => {}
        }

        let (name, rest) = expr.split_once('(').ok_or_else(invalid)?;
        let args: Vec<String> = rest
            .strip_suffix(')')
            .ok_or_else(invalid)?
            .split(',')
            .map(|a| a.trim().trim_matches(|c: char| c == '\'' || c == '"').to_string())
            .filter(|a| !a.is_empty())
            .collect();
        match (name.trim(), args.as_slice()) {
            ("has_role", [role]) => Ok(Access::HasRole(role.clone())),
            ("has_authority", [authority]) => Ok(Access::HasAuthority(authority.clone())),
            ("has_any_role", roles) if !roles.is_empty() => Ok(Access::HasAnyRole(roles.to_vec())),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::PermitAll => write!(f, "permit_all"),
            Access::DenyAll => write!(f, "deny_all"),
            Access::Authenticated => write!(f, "authenticated"),
            Access::Anonymous => write!(f, "anonymous"),
            Access::HasRole(r) => write!(f, "has_role({r})"),
            Access::HasAnyRole(rs) => write!(f, "has_any_role({})", rs.join(", ")),
            Access::HasAuthority(a) => write!(f, "has_authority({a})"),
        }
    }
}

/// Accepts `permit_all`, `"has_role(ADMIN)"`, `{ has_role: ADMIN }` and
/// `{ has_any_role: [USER, ADMIN] }`
impl<'de> Deserialize<'de> for Access {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Arg {
            One(String),
            Many(Vec<String>),
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Expr(String),
            Keyed(BTreeMap<String, Arg>),
        }

        let expression = match Raw::deserialize(deserializer)? {
            Raw::Expr(s) => s,
            Raw::Keyed(map) => {
                let mut entries = map.into_iter();
                match (entries.next(), entries.next()) {
                    (Some((name, Arg::One(arg))), None) => format!("{name}({arg})"),
                    (Some((name, Arg::Many(args))), None) => format!("{name}({})", args.join(", ")),
                    _ => {
                        return Err(serde::de::Error::custom(
                            "access must have exactly one key, e.g. { has_role: ADMIN }",
                        ))
                    }
                }
            }
        };
        expression.parse().map_err(serde::de::Error::custom)
    }
}

/// One authorization rule; `methods` empty means every method
#[derive(Debug, Clone)]
pub struct RequestRule {
    pattern: PathPattern,
    methods: Vec<Method>,
    access: Access,
}

impl RequestRule {
    pub fn new(pattern: &str, methods: &[Method], access: Access) -> Result<Self, ConfigError> {
        Ok(Self {
            pattern: PathPattern::parse(pattern)?,
            methods: methods.to_vec(),
            access,
        })
    }

    fn matches(&self, method: &Method, path: &str) -> bool {
        (self.methods.is_empty() || self.methods.contains(method)) && self.pattern.matches(path)
    }

    pub fn access(&self) -> &Access {
        &self.access
    }
}

/// What an unauthenticated request that needs authentication gets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationEntryPoint {
    /// `302` to the login page
    LoginRedirect(String),
    /// `401` with a Basic challenge
    BasicChallenge { realm: String },
    /// `403`
    Forbidden,
}

impl AuthenticationEntryPoint {
    pub fn commence(&self) -> HttpResponse {
        match self {
            AuthenticationEntryPoint::LoginRedirect(page) => HttpResponse::redirect(page),
            AuthenticationEntryPoint::BasicChallenge { realm } => basic_challenge(realm),
            AuthenticationEntryPoint::Forbidden => HttpResponse::error(403, "Access Denied"),
        }
    }
}

/// Enforces request rules against the current authentication
///
/// Rules are checked in registration order and the first match decides.
/// A request matched by no rule is permitted.
pub struct AuthorizationFilter {
    rules: Vec<RequestRule>,
    entry_point: AuthenticationEntryPoint,
}

impl AuthorizationFilter {
    pub const NAME: &'static str = "authorization";

    pub fn new(rules: Vec<RequestRule>, entry_point: AuthenticationEntryPoint) -> Self {
        Self { rules, entry_point }
    }

    pub fn rules(&self) -> &[RequestRule] {
        &self.rules
    }

    pub fn entry_point(&self) -> &AuthenticationEntryPoint {
        &self.entry_point
    }
}

impl Filter for AuthorizationFilter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn filter(&self, exchange: &mut Exchange, next: Next<'_>) -> Result<HttpResponse, FilterError> {
        let request = exchange.request();
        let Some(rule) = self
            .rules
            .iter()
            .find(|r| r.matches(&request.method, &request.path))
        else {
            return next.run(exchange);
        };

        let authentication = exchange.security_context().authentication();
        if rule.access.is_granted(authentication) {
            debug!(path = %request.path, access = %rule.access, "access granted");
            return next.run(exchange);
        }

        if exchange.security_context().is_authenticated() {
            warn!(
                path = %request.path,
                access = %rule.access,
                principal = authentication.map(|a| a.principal()).unwrap_or_default(),
                "access denied"
            );
            Ok(HttpResponse::error(403, "Access Denied"))
        } else {
            debug!(path = %request.path, access = %rule.access, "authentication required");
            Ok(self.entry_point.commence())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::exchange::HttpRequest;
    use crate::filter::core::handler_fn;
    use crate::security::AuthenticationKind;

    #[test]
    fn test_parse_expressions() {
        assert_eq!("permit_all".parse::<Access>().unwrap(), Access::PermitAll);
        assert_eq!(
            "has_role('ADMIN')".parse::<Access>().unwrap(),
            Access::HasRole("ADMIN".into())
        );
        assert_eq!(
            "has_any_role(USER, ADMIN)".parse::<Access>().unwrap(),
            Access::HasAnyRole(vec!["USER".into(), "ADMIN".into()])
        );
        assert!("has_role()".parse::<Access>().is_err());
        assert!("root".parse::<Access>().is_err());
    }

    #[test]
    fn test_deserialize_keyed_forms() {
        let a: Access = serde_yaml::from_str("{ has_role: ADMIN }").unwrap();
        assert_eq!(a, Access::HasRole("ADMIN".into()));
        let a: Access = serde_yaml::from_str("{ has_any_role: [USER, ADMIN] }").unwrap();
        assert_eq!(a, Access::HasAnyRole(vec!["USER".into(), "ADMIN".into()]));
        let a: Access = serde_yaml::from_str("authenticated").unwrap();
        assert_eq!(a, Access::Authenticated);
    }

    #[test]
    fn test_anonymous_is_not_authenticated() {
        let anon = Authentication::anonymous();
        assert!(!Access::Authenticated.is_granted(Some(&anon)));
        assert!(Access::Anonymous.is_granted(Some(&anon)));
        assert!(Access::Anonymous.is_granted(None));
    }

    fn run(rules: Vec<RequestRule>, auth: Option<Authentication>, path: &str) -> HttpResponse {
        let filters: Vec<Arc<dyn Filter>> = vec![Arc::new(AuthorizationFilter::new(
            rules,
            AuthenticationEntryPoint::LoginRedirect("/login".into()),
        ))];
        let handler = handler_fn(|_: &mut Exchange| Ok(HttpResponse::empty(200)));
        let mut ex = Exchange::new(HttpRequest::get(path), "SESSION");
        if let Some(a) = auth {
            ex.set_authentication(a);
        }
        Next::new(&filters, &handler).run(&mut ex).unwrap()
    }

    fn rules() -> Vec<RequestRule> {
        vec![
            RequestRule::new("/admin/**", &[], Access::HasRole("ADMIN".into())).unwrap(),
            RequestRule::new("/public/**", &[], Access::PermitAll).unwrap(),
            RequestRule::new("/**", &[], Access::Authenticated).unwrap(),
        ]
    }

    #[test]
    fn test_first_match_decides() {
        assert_eq!(run(rules(), None, "/public/a").status, 200);
        let res = run(rules(), None, "/private");
        assert_eq!(res.status, 302);
        assert_eq!(res.get_header("location"), Some("/login"));
    }

    #[test]
    fn test_authenticated_but_forbidden() {
        let user = Authentication::authenticated("u", vec!["ROLE_USER".into()], AuthenticationKind::FormLogin);
        assert_eq!(run(rules(), Some(user.clone()), "/admin/x").status, 403);
        assert_eq!(run(rules(), Some(user), "/home").status, 200);
    }

    #[test]
    fn test_unmatched_request_is_permitted() {
        let only_admin = vec![RequestRule::new("/admin/**", &[], Access::DenyAll).unwrap()];
        assert_eq!(run(only_admin, None, "/anything").status, 200);
    }
}

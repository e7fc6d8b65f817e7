use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{debug, warn};

use super::core::{Filter, FilterError, Next};
use crate::exchange::{Exchange, HttpResponse};
use crate::security::{AuthenticationKind, AuthenticationManager};

/// `401` challenge for HTTP Basic
pub fn basic_challenge(realm: &str) -> HttpResponse {
    let mut response = HttpResponse::error(401, "Unauthorized");
    response.set_header("www-authenticate", format!("Basic realm=\"{realm}\""));
    response
}

/// Authenticates `Authorization: Basic` credentials
///
/// Requests without the header pass through untouched. Invalid credentials
/// are answered with a `401` challenge; valid ones replace the
/// authentication for this request only.
pub struct HttpBasicFilter {
    realm: String,
    manager: AuthenticationManager,
}

impl HttpBasicFilter {
    pub const NAME: &'static str = "http_basic";

    pub fn new(realm: impl Into<String>, manager: AuthenticationManager) -> Self {
        Self {
            realm: realm.into(),
            manager,
        }
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }
}

/// Split `Basic <base64(user:pass)>` into its parts
fn decode_basic(header: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

impl Filter for HttpBasicFilter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn filter(&self, exchange: &mut Exchange, next: Next<'_>) -> Result<HttpResponse, FilterError> {
        let Some(header) = exchange.request().get_header("authorization") else {
            return next.run(exchange);
        };
        if !header.trim_start().to_ascii_lowercase().starts_with("basic ") {
            return next.run(exchange);
        }
        let Some((username, password)) = decode_basic(header) else {
            warn!("malformed basic authentication header");
            return Ok(basic_challenge(&self.realm));
        };

        match self
            .manager
            .authenticate(&username, &password, AuthenticationKind::HttpBasic)
        {
            Ok(authentication) => {
                debug!(username = %username, "basic authentication succeeded");
                exchange.set_authentication(authentication);
                next.run(exchange)
            }
            Err(e) => {
                warn!(username = %username, error = %e, "basic authentication failed");
                Ok(basic_challenge(&self.realm))
            }
        }
    }
}

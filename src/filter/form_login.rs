use http::Method;
use serde_json::json;
use tracing::{debug, info, warn};

use super::core::{Filter, FilterError, Next};
use crate::exchange::{Exchange, HttpResponse};
use crate::security::{AuthenticationKind, AuthenticationManager};

/// Settings for [`FormLoginFilter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormLoginSettings {
    /// Where the credentials are POSTed
    pub login_processing_url: String,
    /// Where unauthenticated users are sent
    pub login_page: String,
    /// Redirect target after a successful login
    pub default_success_url: String,
    /// Redirect target after a failed login
    pub failure_url: String,
    pub username_parameter: String,
    pub password_parameter: String,
    /// Answer `GET login_page` with a description of the form
    pub serve_login_page: bool,
}

impl Default for FormLoginSettings {
    fn default() -> Self {
        Self {
            login_processing_url: "/login".to_string(),
            login_page: "/login".to_string(),
            default_success_url: "/".to_string(),
            failure_url: "/login?error".to_string(),
            username_parameter: "username".to_string(),
            password_parameter: "password".to_string(),
            serve_login_page: true,
        }
    }
}

/// Authenticates `application/x-www-form-urlencoded` login submissions
///
/// A successful login first moves any existing session to a new id, so a
/// session id planted before login never carries the authenticated context.
/// It then replaces the authentication in the exchange and asks for it to be
/// saved. With an explicit-save context stage that save is what
/// persists the login; with the auto-save stage the request is a no-op and
/// the context is saved on exit anyway.
pub struct FormLoginFilter {
    settings: FormLoginSettings,
    manager: AuthenticationManager,
}

impl FormLoginFilter {
    pub const NAME: &'static str = "form_login";

    pub fn new(settings: FormLoginSettings, manager: AuthenticationManager) -> Self {
        Self { settings, manager }
    }

    pub fn settings(&self) -> &FormLoginSettings {
        &self.settings
    }

    fn credentials(&self, body: &str) -> (Option<String>, Option<String>) {
        let mut username = None;
        let mut password = None;
        for (key, value) in url::form_urlencoded::parse(body.as_bytes()) {
            if key == self.settings.username_parameter.as_str() {
                username = Some(value.into_owned());
            } else if key == self.settings.password_parameter.as_str() {
                password = Some(value.into_owned());
            }
        }
        (username, password)
    }

    fn login_page(&self, exchange: &Exchange) -> HttpResponse {
        let error = exchange
            .request()
            .query
            .as_deref()
            .is_some_and(|q| url::form_urlencoded::parse(q.as_bytes()).any(|(k, _)| k == "error"));
        HttpResponse::json(
            200,
            json!({
                "login_processing_url": self.settings.login_processing_url,
                "username_parameter": self.settings.username_parameter,
                "password_parameter": self.settings.password_parameter,
                "error": error,
            }),
        )
    }
}

impl Filter for FormLoginFilter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn filter(&self, exchange: &mut Exchange, next: Next<'_>) -> Result<HttpResponse, FilterError> {
        let request = exchange.request();
        let path = request.path.as_str();
        let login_page = self.settings.login_page.split('?').next().unwrap_or_default();

        if request.method == Method::GET && self.settings.serve_login_page && path == login_page {
            return Ok(self.login_page(exchange));
        }
        if request.method != Method::POST || path != self.settings.login_processing_url {
            return next.run(exchange);
        }

        let (username, password) = self.credentials(request.body.as_deref().unwrap_or_default());
        let (Some(username), Some(password)) = (username, password) else {
            debug!("login submission without credentials");
            return Ok(HttpResponse::redirect(&self.settings.failure_url));
        };

        match self
            .manager
            .authenticate(&username, &password, AuthenticationKind::FormLogin)
        {
            Ok(authentication) => {
                exchange.change_session_id()?;
                exchange.set_authentication(authentication);
                exchange.save_security_context()?;
                info!(
                    request_id = %exchange.request().request_id,
                    username = %username,
                    "form login succeeded"
                );
                Ok(HttpResponse::redirect(&self.settings.default_success_url))
            }
            Err(e) => {
                warn!(username = %username, error = %e, "form login failed");
                Ok(HttpResponse::redirect(&self.settings.failure_url))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::exchange::HttpRequest;
    use crate::filter::core::handler_fn;
    use crate::security::{InMemoryUserDetailsManager, UserDetails};

    fn filters() -> Vec<Arc<dyn Filter>> {
        let users = InMemoryUserDetailsManager::new([UserDetails::new("user", "password", &["USER"])]);
        let manager = AuthenticationManager::new(Arc::new(users));
        vec![Arc::new(FormLoginFilter::new(FormLoginSettings::default(), manager))]
    }

    fn run(req: HttpRequest) -> (HttpResponse, Exchange) {
        let handler = handler_fn(|_: &mut Exchange| Ok(HttpResponse::empty(200)));
        let filters = filters();
        let mut ex = Exchange::new(req, "SESSION");
        let res = Next::new(&filters, &handler).run(&mut ex).unwrap();
        (res, ex)
    }

    #[test]
    fn test_successful_login_redirects_home() {
        let (res, ex) = run(HttpRequest::post("/login").with_body("username=user&password=password"));
        assert_eq!(res.status, 302);
        assert_eq!(res.get_header("location"), Some("/"));
        assert!(ex.security_context().is_authenticated());
        assert_eq!(
            ex.security_context().authentication().map(|a| a.principal()),
            Some("user")
        );
    }

    #[test]
    fn test_failed_login_redirects_to_error() {
        let (res, ex) = run(HttpRequest::post("/login").with_body("username=user&password=wrong"));
        assert_eq!(res.get_header("location"), Some("/login?error"));
        assert!(!ex.security_context().is_authenticated());

        let (res, _) = run(HttpRequest::post("/login").with_body("username=user"));
        assert_eq!(res.get_header("location"), Some("/login?error"));
    }

    #[test]
    fn test_url_encoded_values() {
        let users = InMemoryUserDetailsManager::new([UserDetails::new("a b", "p&w", &[])]);
        let filter = FormLoginFilter::new(
            FormLoginSettings::default(),
            AuthenticationManager::new(Arc::new(users)),
        );
        assert_eq!(
            filter.credentials("username=a+b&password=p%26w"),
            (Some("a b".to_string()), Some("p&w".to_string()))
        );
    }

    #[test]
    fn test_login_page_and_passthrough() {
        let (res, _) = run(HttpRequest::get("/login"));
        assert_eq!(res.status, 200);
        assert_eq!(res.body["login_processing_url"], "/login");
        assert_eq!(res.body["error"], false);

        let (res, _) = run(HttpRequest::get("/login?error"));
        assert_eq!(res.status, 200);
        assert_eq!(res.body["error"], true);

        let (res, _) = run(HttpRequest::get("/other"));
        assert_eq!(res.status, 200);
        assert!(res.body.is_null());
    }
}

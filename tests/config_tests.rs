mod common;

use std::io::Write;

use brrtguard::config::GuardConfig;
use brrtguard::exchange::HttpRequest;
use brrtguard::ConfigError;
use common::{APP_ORIGIN, EVIL_ORIGIN};
use http::Method;
use tempfile::NamedTempFile;

const FULL: &str = r#"
security_matcher: "/**"
tracing: true
cors:
  reject: forbid
  configurations:
    "/api/**":
      allowed_origins: ["https://app.example.com"]
      allowed_methods: [GET, POST]
      allow_credentials: true
      max_age: 120
security_context:
  require_explicit_save: true
session:
  creation_policy: if_required
  cookie_name: GUARD
form_login:
  login_page: /signin
  login_processing_url: /signin
http_basic:
  realm: Guard
users:
  - { username: user, password: password, roles: [USER] }
  - { username: admin, password: secret, roles: [USER, ADMIN] }
  - { username: ghost, password: boo, roles: [USER], enabled: false }
authorize:
  - { pattern: "/signin", access: permit_all }
  - { pattern: "/admin/**", access: "has_role(ADMIN)" }
  - { pattern: "/api/**", methods: [DELETE], access: deny_all }
  - { pattern: "/**", access: authenticated }
"#;

fn write_config(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[test]
fn test_full_config_from_file() {
    let file = write_config(FULL);
    let config = GuardConfig::load(file.path()).unwrap();
    let proxy = config.into_proxy().unwrap();
    assert_eq!(
        proxy.filters_for("/api/items"),
        vec![
            "tracing",
            "cors",
            "security_context_holder",
            "form_login",
            "http_basic",
            "anonymous",
            "authorization",
        ]
    );
    assert_eq!(&**proxy.chains()[0].session_cookie(), "GUARD");

    let preflight = proxy.serve(
        HttpRequest::new(Method::OPTIONS, "/api/items")
            .with_header("origin", APP_ORIGIN)
            .with_header("access-control-request-method", "POST"),
        &common::ok(),
    );
    assert_eq!(preflight.status, 200);
    assert_eq!(preflight.get_header("access-control-max-age"), Some("120"));

    let evil = proxy.serve(
        HttpRequest::get("/api/items").with_header("origin", EVIL_ORIGIN),
        &common::ok(),
    );
    assert_eq!(evil.status, 403);

    let redirect = proxy.serve(HttpRequest::get("/api/items"), &common::ok());
    assert_eq!(redirect.status, 302);
    assert_eq!(redirect.get_header("location"), Some("/signin"));

    let admin = proxy.serve(
        HttpRequest::get("/admin/panel").with_header("authorization", common::basic("admin", "secret")),
        &common::whoami(),
    );
    assert_eq!(admin.status, 200);

    let delete = proxy.serve(
        HttpRequest::new(Method::DELETE, "/api/items/1")
            .with_header("authorization", common::basic("admin", "secret")),
        &common::ok(),
    );
    assert_eq!(delete.status, 403);

    let disabled = proxy.serve(
        HttpRequest::get("/home").with_header("authorization", common::basic("ghost", "boo")),
        &common::ok(),
    );
    assert_eq!(disabled.status, 401);
}

#[test]
fn test_explicit_save_login_from_config() {
    let config = GuardConfig::from_yaml(FULL).unwrap();
    let proxy = config.into_proxy().unwrap();

    let login = proxy.serve(
        HttpRequest::post("/signin").with_body("username=user&password=password"),
        &common::ok(),
    );
    assert_eq!(login.status, 302);
    let cookie = common::session_cookie(&login).unwrap();
    let (name, value) = cookie.split_once('=').unwrap();
    assert_eq!(name, "GUARD");

    let me = proxy.serve(HttpRequest::get("/home").with_cookie(name, value), &common::whoami());
    assert_eq!(me.status, 200);
    assert_eq!(me.body["principal"], "user");
}

#[test]
fn test_dispatch_integration_from_config() {
    let config = GuardConfig::from_yaml(
        r#"
cors: {}
dispatch:
  global: { allowed_origins: ["https://app.example.com"] }
  routes:
    - { pattern: "/api/**" }
    - { pattern: "/api/upload", methods: [POST], cors: { allowed_methods: [POST], allow_credentials: true } }
    - { pattern: "/internal/**", cors: false }
"#,
    )
    .unwrap();
    let proxy = config.into_proxy().unwrap();
    assert!(proxy.filters_for("/").contains(&"cors"));

    let inherit = proxy.serve(
        HttpRequest::get("/api/items").with_header("origin", APP_ORIGIN),
        &common::ok(),
    );
    assert_eq!(inherit.get_header("access-control-allow-origin"), Some(APP_ORIGIN));

    let upload = proxy.serve(
        HttpRequest::post("/api/upload").with_header("origin", APP_ORIGIN),
        &common::ok(),
    );
    assert_eq!(upload.get_header("access-control-allow-credentials"), Some("true"));

    let internal = proxy.serve(
        HttpRequest::get("/internal/health").with_header("origin", APP_ORIGIN),
        &common::ok(),
    );
    assert!(!internal.has_header("access-control-allow-origin"));
}

#[test]
fn test_cors_without_source_is_rejected() {
    let config = GuardConfig::from_yaml("cors: {}").unwrap();
    assert_eq!(config.into_proxy().unwrap_err(), ConfigError::MissingCorsIntegration);

    let disabled = GuardConfig::from_yaml("cors: { enabled: false }").unwrap();
    assert!(!disabled.into_proxy().unwrap().filters_for("/").contains(&"cors"));
}

#[test]
fn test_invalid_cors_settings_rejected() {
    let wildcard = GuardConfig::from_yaml(
        r#"
cors:
  configurations:
    "/**": { allowed_origins: ["*"], allow_credentials: true }
"#,
    )
    .unwrap();
    assert_eq!(wildcard.into_proxy().unwrap_err(), ConfigError::WildcardWithCredentials);

    let malformed = GuardConfig::from_yaml(
        r#"
cors:
  configurations:
    "/**": { allowed_origins: ["app.example.com"] }
"#,
    )
    .unwrap();
    assert!(matches!(
        malformed.into_proxy().unwrap_err(),
        ConfigError::InvalidOriginFormat { .. }
    ));

    let bad_pattern = GuardConfig::from_yaml(
        r#"
cors:
  configurations:
    "api/**": { allowed_origins: ["https://app.example.com"] }
"#,
    )
    .unwrap();
    assert!(matches!(
        bad_pattern.into_proxy().unwrap_err(),
        ConfigError::InvalidPathPattern { .. }
    ));
}

#[test]
fn test_invalid_access_expression_rejected_at_parse() {
    let err = GuardConfig::from_yaml(
        r#"
authorize:
  - { pattern: "/**", access: "has_role(" }
"#,
    )
    .unwrap_err();
    assert!(format!("{err:#}").contains("has_role("));
}

#[test]
fn test_stateless_repository_from_config() {
    let config = GuardConfig::from_yaml(
        r#"
security_context: { repository: stateless }
form_login: {}
users:
  - { username: user, password: password, roles: [USER] }
"#,
    )
    .unwrap();
    let proxy = config.into_proxy().unwrap();
    let login = proxy.serve(
        HttpRequest::post("/login").with_body("username=user&password=password"),
        &common::ok(),
    );
    assert_eq!(login.status, 302);
    assert!(!login.has_header("set-cookie"));
}

#[test]
fn test_missing_file() {
    let err = GuardConfig::load("/nonexistent/guard.yaml").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

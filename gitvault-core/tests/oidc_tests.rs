// tests/oidc_tests.rs

use std::sync::Arc;

use gitvault_common::error::Error;
use gitvault_core::auth::oidc::OidcClient;
use gitvault_core::test_utils::TestHttpClient;

const DISCOVERY_BODY: &str = r#"{
    "issuer": "https://example.com/issuer",
    "authorization_endpoint": "https://example.com/issuer/authorize",
    "token_endpoint": "https://example.com/issuer/token",
    "device_authorization_endpoint": "https://example.com/issuer/devicecode",
    "userinfo_endpoint": "https://example.com/issuer/userinfo"
}"#;

#[tokio::test]
async fn discovery_inserts_exactly_one_slash() {
    let http = Arc::new(TestHttpClient::new());
    http.enqueue_json(200, DISCOVERY_BODY);

    let client = OidcClient::new(http.clone(), "https://example.com/issuer");
    let config = client.get_configuration().await.unwrap();

    assert_eq!(
        http.requests()[0].url,
        "https://example.com/issuer/.well-known/openid-configuration"
    );
    assert_eq!(
        config.token_endpoint.as_deref(),
        Some("https://example.com/issuer/token")
    );
}

#[tokio::test]
async fn discovery_does_not_double_a_trailing_slash() {
    let http = Arc::new(TestHttpClient::new());
    http.enqueue_json(200, DISCOVERY_BODY);

    let client = OidcClient::new(http.clone(), "https://example.com/issuer/");
    client.get_configuration().await.unwrap();

    assert_eq!(
        http.requests()[0].url,
        "https://example.com/issuer/.well-known/openid-configuration"
    );
}

#[tokio::test]
async fn discovery_collapses_repeated_trailing_slashes() {
    let http = Arc::new(TestHttpClient::new());
    http.enqueue_json(200, DISCOVERY_BODY);

    let client = OidcClient::new(http.clone(), "https://example.com/issuer///");
    client.get_configuration().await.unwrap();

    assert_eq!(
        http.requests()[0].url,
        "https://example.com/issuer/.well-known/openid-configuration"
    );
}

#[tokio::test]
async fn discovery_failure_is_a_transport_error() {
    let http = Arc::new(TestHttpClient::new());
    http.enqueue_json(503, "service unavailable");

    let client = OidcClient::new(http, "https://example.com/issuer");
    let err = client.get_configuration().await.unwrap_err();
    assert!(matches!(err, Error::Endpoint { status: 503, .. }));
}

#[tokio::test]
async fn discovery_tolerates_missing_optional_endpoints() {
    let http = Arc::new(TestHttpClient::new());
    http.enqueue_json(200, r#"{"issuer":"https://example.com"}"#);

    let client = OidcClient::new(http, "https://example.com");
    let config = client.get_configuration().await.unwrap();
    assert!(config.device_authorization_endpoint.is_none());
    assert!(config.registration_endpoint.is_none());
}

// tests/registry_tests.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use gitvault_common::error::Error;
use gitvault_common::models::credential::Credential;
use gitvault_common::models::input::InputArguments;
use gitvault_core::auth::registry::{HostProviderPriority, HostProviderRegistry};
use gitvault_core::auth::HostProvider;
use gitvault_core::http::HttpResponse;
use gitvault_core::test_utils::TestHttpClient;

/// A provider that claims hosts ending in a suffix and/or responses
/// carrying a marker header.
struct StubProvider {
    id: &'static str,
    host_suffix: Option<&'static str>,
    probe_header: Option<&'static str>,
    pattern_calls: AtomicUsize,
}

impl StubProvider {
    fn by_pattern(id: &'static str, suffix: &'static str) -> Self {
        Self {
            id,
            host_suffix: Some(suffix),
            probe_header: None,
            pattern_calls: AtomicUsize::new(0),
        }
    }

    fn by_probe(id: &'static str, header: &'static str) -> Self {
        Self {
            id,
            host_suffix: None,
            probe_header: Some(header),
            pattern_calls: AtomicUsize::new(0),
        }
    }

    fn catch_all(id: &'static str) -> Self {
        Self {
            id,
            host_suffix: Some(""),
            probe_header: None,
            pattern_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl HostProvider for StubProvider {
    fn id(&self) -> &'static str {
        self.id
    }

    fn name(&self) -> &'static str {
        self.id
    }

    fn is_supported(&self, input: &InputArguments) -> bool {
        self.pattern_calls.fetch_add(1, Ordering::SeqCst);
        self.host_suffix
            .is_some_and(|suffix| input.host_name().ends_with(suffix))
    }

    fn is_supported_response(&self, response: &HttpResponse) -> bool {
        self.probe_header
            .is_some_and(|header| response.header(header).is_some())
    }

    async fn get_credential(
        &self,
        _input: &InputArguments,
        _cancel: &CancellationToken,
    ) -> Result<Credential, Error> {
        Ok(Credential::new("stub", "stub"))
    }

    async fn store_credential(&self, _input: &InputArguments) -> Result<(), Error> {
        Ok(())
    }

    async fn erase_credential(&self, _input: &InputArguments) -> Result<(), Error> {
        Ok(())
    }
}

fn input(host: &str) -> InputArguments {
    let mut map = HashMap::new();
    map.insert("protocol".to_string(), "https".to_string());
    map.insert("host".to_string(), host.to_string());
    InputArguments::from_map(map).unwrap()
}

#[tokio::test]
async fn pattern_match_wins_without_any_network_call() {
    let http = Arc::new(TestHttpClient::new());
    let mut registry = HostProviderRegistry::new(http.clone());
    registry.register(
        Arc::new(StubProvider::by_pattern("github", "github.com")),
        HostProviderPriority::Normal,
    );
    registry.register(
        Arc::new(StubProvider::catch_all("generic")),
        HostProviderPriority::Low,
    );

    let provider = registry.get_provider(&input("github.com")).await.unwrap();
    assert_eq!(provider.id(), "github");
    assert_eq!(http.request_count(), 0);
}

#[tokio::test]
async fn providers_are_consulted_in_registration_order() {
    let http = Arc::new(TestHttpClient::new());
    let mut registry = HostProviderRegistry::new(http);
    registry.register(
        Arc::new(StubProvider::by_pattern("first", "example.com")),
        HostProviderPriority::Normal,
    );
    registry.register(
        Arc::new(StubProvider::by_pattern("second", "example.com")),
        HostProviderPriority::Normal,
    );

    let provider = registry.get_provider(&input("example.com")).await.unwrap();
    assert_eq!(provider.id(), "first");
}

#[tokio::test]
async fn probe_breaks_the_tie_for_self_hosted_instances() {
    let http = Arc::new(TestHttpClient::new());
    http.enqueue_with_headers(200, &[("X-GitHub-Request-Id", "abc:123")], "");

    let mut registry = HostProviderRegistry::new(http.clone());
    registry.register(
        Arc::new(StubProvider::by_probe("github", "X-GitHub-Request-Id")),
        HostProviderPriority::Normal,
    );
    registry.register(
        Arc::new(StubProvider::catch_all("generic")),
        HostProviderPriority::Low,
    );

    let provider = registry
        .get_provider(&input("git.example.com"))
        .await
        .unwrap();
    assert_eq!(provider.id(), "github");
    assert_eq!(http.request_count(), 1);
    assert_eq!(http.requests()[0].method, "HEAD");
    assert_eq!(http.requests()[0].url, "https://git.example.com/");
}

#[tokio::test]
async fn probe_failure_falls_back_to_generic() {
    let http = Arc::new(TestHttpClient::new());
    http.enqueue_error(Error::Auth("connection refused".to_string()));

    let mut registry = HostProviderRegistry::new(http);
    registry.register(
        Arc::new(StubProvider::by_probe("github", "X-GitHub-Request-Id")),
        HostProviderPriority::Normal,
    );
    registry.register(
        Arc::new(StubProvider::catch_all("generic")),
        HostProviderPriority::Low,
    );

    let provider = registry
        .get_provider(&input("git.example.com"))
        .await
        .unwrap();
    assert_eq!(provider.id(), "generic");
}

#[tokio::test]
async fn disabled_probe_skips_the_network_entirely() {
    let http = Arc::new(TestHttpClient::new());
    let mut registry = HostProviderRegistry::new(http.clone())
        .with_probe(false, std::time::Duration::from_millis(100));
    registry.register(
        Arc::new(StubProvider::by_probe("github", "X-GitHub-Request-Id")),
        HostProviderPriority::Normal,
    );
    registry.register(
        Arc::new(StubProvider::catch_all("generic")),
        HostProviderPriority::Low,
    );

    let provider = registry
        .get_provider(&input("git.example.com"))
        .await
        .unwrap();
    assert_eq!(provider.id(), "generic");
    assert_eq!(http.request_count(), 0);
}

#[tokio::test]
async fn no_provider_found_when_nothing_claims_the_host() {
    let http = Arc::new(TestHttpClient::new());
    http.enqueue_json(200, "");

    let mut registry = HostProviderRegistry::new(http);
    registry.register(
        Arc::new(StubProvider::by_pattern("github", "github.com")),
        HostProviderPriority::Normal,
    );

    let err = registry
        .get_provider(&input("git.example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoProviderFound(_)));
}

// tests/azure_provider_tests.rs

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use gitvault_common::error::Error;
use gitvault_common::models::input::InputArguments;
use gitvault_core::auth::HostProvider;
use gitvault_core::auth::broker::{BrokerTokenResult, IdentityBroker};
use gitvault_core::cache::AuthorityCache;
use gitvault_core::config::Settings;
use gitvault_core::providers::AzureReposProvider;
use gitvault_core::store::{CredentialStore, MemoryCredentialStore};
use gitvault_core::test_utils::{InMemoryTextStore, TestBrowser, TestHttpClient, TestTerminal};

/// A broker that always signs in the same account.
struct FakeBroker {
    upn: Option<String>,
}

#[async_trait]
impl IdentityBroker for FakeBroker {
    fn is_available(&self) -> bool {
        true
    }

    async fn acquire_token(
        &self,
        authority: &str,
        _scopes: &[String],
        _username: Option<&str>,
        _cancel: &CancellationToken,
    ) -> Result<BrokerTokenResult, Error> {
        assert!(authority.starts_with("https://login.microsoftonline.com/"));
        Ok(BrokerTokenResult {
            access_token: "broker-token".to_string(),
            account_upn: self.upn.clone(),
        })
    }
}

struct Fixture {
    provider: AzureReposProvider,
    http: Arc<TestHttpClient>,
    store: Arc<MemoryCredentialStore>,
    cache: Arc<AuthorityCache>,
}

fn fixture(settings: Settings, broker: Arc<dyn IdentityBroker>) -> Fixture {
    let http = Arc::new(TestHttpClient::new());
    let store = Arc::new(MemoryCredentialStore::new());
    let cache = Arc::new(AuthorityCache::new(Box::new(InMemoryTextStore::new())));

    let provider = AzureReposProvider::new(
        http.clone(),
        store.clone(),
        Arc::new(settings),
        Arc::new(TestTerminal::new()),
        Arc::new(TestBrowser::new()),
        broker,
        cache.clone(),
    );

    Fixture {
        provider,
        http,
        store,
        cache,
    }
}

fn input(pairs: &[(&str, &str)]) -> InputArguments {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    InputArguments::from_map(map).unwrap()
}

#[test]
fn organization_name_extraction() {
    let org = AzureReposProvider::organization_name(&input(&[
        ("protocol", "https"),
        ("host", "dev.azure.com"),
        ("path", "contoso/project/_git/repo"),
    ]))
    .unwrap();
    assert_eq!(org, "contoso");

    // Azure DevOps borrows the URL's username slot for the org name.
    let org = AzureReposProvider::organization_name(&input(&[
        ("protocol", "https"),
        ("host", "dev.azure.com"),
        ("username", "fabrikam"),
    ]))
    .unwrap();
    assert_eq!(org, "fabrikam");

    let org = AzureReposProvider::organization_name(&input(&[
        ("protocol", "https"),
        ("host", "contoso.visualstudio.com"),
    ]))
    .unwrap();
    assert_eq!(org, "contoso");

    assert!(
        AzureReposProvider::organization_name(&input(&[
            ("protocol", "https"),
            ("host", "dev.azure.com"),
        ]))
        .is_err()
    );
}

#[test]
fn supports_azure_hosts_only() {
    let fx = fixture(Settings::for_testing(), Arc::new(FakeBroker { upn: None }));

    let supported = |host: &str| {
        fx.provider
            .is_supported(&input(&[("protocol", "https"), ("host", host)]))
    };

    assert!(supported("dev.azure.com"));
    assert!(supported("contoso.visualstudio.com"));
    assert!(!supported("visualstudio.com"));
    assert!(!supported("example.com"));
}

#[tokio::test]
async fn broker_path_resolves_authority_and_caches_it() {
    let fx = fixture(
        Settings::for_testing().with_use_broker(true),
        Arc::new(FakeBroker {
            upn: Some("jsquire@contoso.com".to_string()),
        }),
    );
    fx.http.enqueue_with_headers(
        401,
        &[("X-VSS-ResourceTenant", "fd3a4262-3b73-4b13-a56a-357dbbee9b3f")],
        "",
    );

    let request = input(&[
        ("protocol", "https"),
        ("host", "dev.azure.com"),
        ("path", "contoso/project/_git/repo"),
    ]);

    let credential = fx
        .provider
        .get_credential(&request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(credential.account, "jsquire@contoso.com");
    assert_eq!(credential.secret, "broker-token");

    // Tenant lookup hit the org URL once and the answer was cached.
    assert_eq!(fx.http.request_count(), 1);
    assert_eq!(fx.http.requests()[0].url, "https://dev.azure.com/contoso");
    assert_eq!(
        fx.cache.get_authority("contoso").await.unwrap().as_deref(),
        Some("https://login.microsoftonline.com/fd3a4262-3b73-4b13-a56a-357dbbee9b3f")
    );

    // A second request reuses the cached authority: no new HEAD probe.
    fx.provider
        .get_credential(&request, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(fx.http.request_count(), 1);
}

#[tokio::test]
async fn stored_credential_short_circuits_everything() {
    let fx = fixture(
        Settings::for_testing().with_use_broker(true),
        Arc::new(FakeBroker { upn: None }),
    );
    fx.store
        .add_or_update("https://dev.azure.com/contoso", "jsquire", "stored-pat")
        .unwrap();

    let credential = fx
        .provider
        .get_credential(
            &input(&[
                ("protocol", "https"),
                ("host", "dev.azure.com"),
                ("path", "contoso/project/_git/repo"),
            ]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(credential.secret, "stored-pat");
    assert_eq!(fx.http.request_count(), 0);
}

#[tokio::test]
async fn erase_clears_the_cached_authority_too() {
    let fx = fixture(Settings::for_testing(), Arc::new(FakeBroker { upn: None }));
    fx.store
        .add_or_update("https://dev.azure.com/contoso", "jsquire", "stale")
        .unwrap();
    fx.cache
        .update_authority("contoso", "https://login.microsoftonline.com/stale-tenant")
        .await
        .unwrap();

    fx.provider
        .erase_credential(&input(&[
            ("protocol", "https"),
            ("host", "dev.azure.com"),
            ("path", "contoso/project/_git/repo"),
            ("username", "jsquire"),
        ]))
        .await
        .unwrap();

    assert!(
        fx.store
            .get("https://dev.azure.com/contoso", Some("jsquire"))
            .unwrap()
            .is_none()
    );
    assert_eq!(fx.cache.get_authority("contoso").await.unwrap(), None);
}

#[tokio::test]
async fn unencrypted_http_is_rejected() {
    let fx = fixture(Settings::for_testing(), Arc::new(FakeBroker { upn: None }));

    let err = fx
        .provider
        .get_credential(
            &input(&[
                ("protocol", "http"),
                ("host", "dev.azure.com"),
                ("path", "contoso/p/_git/r"),
            ]),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(err.to_string().contains("HTTPS"));
}

// tests/github_provider_tests.rs

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use gitvault_common::models::auth::AuthenticationModes;
use gitvault_common::models::input::InputArguments;
use gitvault_core::auth::HostProvider;
use gitvault_core::config::Settings;
use gitvault_core::providers::GitHubProvider;
use gitvault_core::store::{CredentialStore, MemoryCredentialStore};
use gitvault_core::test_utils::{TestBrowser, TestHelperRunner, TestHttpClient, TestTerminal};
use url::Url;

struct Fixture {
    provider: GitHubProvider,
    http: Arc<TestHttpClient>,
    terminal: Arc<TestTerminal>,
    store: Arc<MemoryCredentialStore>,
    helper: Arc<TestHelperRunner>,
    _helper_file: Option<tempfile::NamedTempFile>,
}

fn fixture(settings: Settings) -> Fixture {
    fixture_with_helper(settings, false)
}

fn fixture_with_helper(settings: Settings, with_helper: bool) -> Fixture {
    let (settings, helper_file) = if with_helper {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_string_lossy().into_owned();
        (settings.with_helper_override("github", &path), Some(file))
    } else {
        (settings.with_helper_override("github", ""), None)
    };

    let http = Arc::new(TestHttpClient::new());
    let terminal = Arc::new(TestTerminal::new());
    let store = Arc::new(MemoryCredentialStore::new());
    let helper = Arc::new(TestHelperRunner::new());

    let provider = GitHubProvider::new(
        http.clone(),
        store.clone(),
        Arc::new(settings),
        terminal.clone(),
        Arc::new(TestBrowser::new()),
        helper.clone(),
    );

    Fixture {
        provider,
        http,
        terminal,
        store,
        helper,
        _helper_file: helper_file,
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
fn supports_dotcom_gist_and_enterprise_hosts() {
    let fx = fixture(Settings::for_testing());
    let supported = |host: &str| {
        fx.provider
            .is_supported(&input(&[("protocol", "https"), ("host", host)]))
    };

    assert!(supported("github.com"));
    assert!(supported("gist.github.com"));
    assert!(supported("github.example.com"));
    assert!(supported("gist.github.example.com"));
    assert!(supported("GitHub.Com"));

    assert!(!supported("example.com"));
    assert!(!supported("gist.example.com"));
    assert!(!supported("githubby.example.com"));

    assert!(
        !fx.provider
            .is_supported(&input(&[("protocol", "ssh"), ("host", "github.com")]))
    );
}

#[tokio::test]
async fn dotcom_policy_never_offers_basic() {
    let fx = fixture(Settings::for_testing());
    let remote = Url::parse("https://github.com/org/repo").unwrap();

    let modes = fx.provider.supported_modes(&remote).await;
    assert!(!modes.contains(AuthenticationModes::BASIC));
    assert!(modes.contains(AuthenticationModes::BROWSER));
    assert!(modes.contains(AuthenticationModes::DEVICE));
    assert!(modes.contains(AuthenticationModes::PAT));
    assert_eq!(fx.http.request_count(), 0);
}

#[tokio::test]
async fn enterprise_discovery_reads_meta_endpoint() {
    let fx = fixture(Settings::for_testing());
    fx.http.enqueue_json(
        200,
        r#"{"verifiable_password_authentication":true,"installed_version":"3.9.2"}"#,
    );

    let remote = Url::parse("https://github.example.com/org/repo").unwrap();
    let modes = fx.provider.supported_modes(&remote).await;

    assert_eq!(
        fx.http.requests()[0].url,
        "https://github.example.com/api/v3/meta"
    );
    assert!(modes.contains(AuthenticationModes::BASIC));
    assert!(modes.contains(AuthenticationModes::PAT));
    assert!(modes.contains(AuthenticationModes::OAUTH));
}

#[tokio::test]
async fn enterprise_discovery_old_version_has_no_oauth() {
    let fx = fixture(Settings::for_testing());
    fx.http.enqueue_json(
        200,
        r#"{"verifiable_password_authentication":false,"installed_version":"2.22.0"}"#,
    );

    let remote = Url::parse("https://github.example.com/org/repo").unwrap();
    let modes = fx.provider.supported_modes(&remote).await;

    assert_eq!(modes, AuthenticationModes::PAT);
}

#[tokio::test]
async fn discovery_failure_fails_open_to_all_modes() {
    let fx = fixture(Settings::for_testing());
    fx.http
        .enqueue_error(gitvault_common::error::Error::Auth("offline".to_string()));

    let remote = Url::parse("https://github.example.com/org/repo").unwrap();
    let modes = fx.provider.supported_modes(&remote).await;

    assert_eq!(modes, AuthenticationModes::ALL);
}

#[tokio::test]
async fn mode_override_short_circuits_discovery() {
    let fx = fixture(
        Settings::for_testing().with_mode_override("github", AuthenticationModes::PAT),
    );

    let remote = Url::parse("https://github.example.com/org/repo").unwrap();
    let modes = fx.provider.supported_modes(&remote).await;

    assert_eq!(modes, AuthenticationModes::PAT);
    assert_eq!(fx.http.request_count(), 0);
}

#[tokio::test]
async fn existing_credential_short_circuits_prompting() {
    let fx = fixture(Settings::for_testing());
    fx.store
        .add_or_update("https://github.com", "jsquire", "stored-token")
        .unwrap();

    let credential = fx
        .provider
        .get_credential(
            &input(&[("protocol", "https"), ("host", "github.com")]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(credential.account, "jsquire");
    assert_eq!(credential.secret, "stored-token");
    assert_eq!(fx.http.request_count(), 0);
}

#[tokio::test]
async fn unencrypted_http_is_rejected_with_guidance() {
    let fx = fixture(Settings::for_testing());

    let err = fx
        .provider
        .get_credential(
            &input(&[("protocol", "http"), ("host", "github.com")]),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(err.to_string().contains("HTTPS"));
}

#[tokio::test]
async fn pat_mode_with_known_username_prompts_for_token_only() {
    let fx = fixture(
        Settings::for_testing().with_mode_override("github", AuthenticationModes::PAT),
    );
    fx.terminal.queue_secret("Token", "ghp_abc123");

    let credential = fx
        .provider
        .get_credential(
            &input(&[
                ("protocol", "https"),
                ("host", "github.com"),
                ("username", "jsquire"),
            ]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(credential.account, "jsquire");
    assert_eq!(credential.secret, "ghp_abc123");
    assert_eq!(fx.http.request_count(), 0);
    assert_eq!(fx.terminal.prompt_log(), vec!["Token"]);
}

#[tokio::test]
async fn pat_mode_without_username_resolves_it_via_rest() {
    let fx = fixture(
        Settings::for_testing().with_mode_override("github", AuthenticationModes::PAT),
    );
    fx.terminal.queue_secret("Token", "ghp_abc123");
    fx.http.enqueue_json(200, r#"{"login":"jsquire"}"#);

    let credential = fx
        .provider
        .get_credential(
            &input(&[("protocol", "https"), ("host", "github.com")]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(credential.account, "jsquire");
    let request = &fx.http.requests()[0];
    assert_eq!(request.url, "https://api.github.com/user");
    assert_eq!(
        request.headers.get("Authorization").map(String::as_str),
        Some("token ghp_abc123")
    );
}

#[tokio::test]
async fn basic_mode_mints_a_pat_and_stores_it_eagerly() {
    let fx = fixture(
        Settings::for_testing().with_mode_override("github", AuthenticationModes::BASIC),
    );
    fx.terminal.queue_prompt("Username", "jsquire");
    fx.terminal.queue_secret("Password", "password");
    fx.http.enqueue_json(201, r#"{"token":"ghp_minted"}"#);
    fx.http.enqueue_json(200, r#"{"login":"jsquire"}"#);

    let credential = fx
        .provider
        .get_credential(
            &input(&[("protocol", "https"), ("host", "github.com")]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(credential.account, "jsquire");
    assert_eq!(credential.secret, "ghp_minted");
    // Username is prompted before the password.
    assert_eq!(fx.terminal.prompt_log(), vec!["Username", "Password"]);

    // The minted token was persisted before returning.
    let stored = fx
        .store
        .get("https://github.com", Some("jsquire"))
        .unwrap()
        .unwrap();
    assert_eq!(stored.secret, "ghp_minted");
}

#[tokio::test]
async fn basic_mode_retries_once_after_two_factor_challenge() {
    let fx = fixture(
        Settings::for_testing().with_mode_override("github", AuthenticationModes::BASIC),
    );
    fx.terminal.queue_prompt("Username", "jsquire");
    fx.terminal.queue_secret("Password", "password");
    fx.terminal.queue_prompt("Authentication code", "123456");

    fx.http
        .enqueue_with_headers(401, &[("X-GitHub-OTP", "required; sms")], "");
    fx.http.enqueue_json(201, r#"{"token":"ghp_minted"}"#);
    fx.http.enqueue_json(200, r#"{"login":"jsquire"}"#);

    let credential = fx
        .provider
        .get_credential(
            &input(&[("protocol", "https"), ("host", "github.com")]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(credential.secret, "ghp_minted");

    let requests = fx.http.requests();
    assert_eq!(requests.len(), 3);
    assert!(!requests[0].headers.contains_key("X-GitHub-OTP"));
    assert_eq!(
        requests[1].headers.get("X-GitHub-OTP").map(String::as_str),
        Some("123456")
    );
}

#[tokio::test]
async fn second_two_factor_failure_is_terminal() {
    let fx = fixture(
        Settings::for_testing().with_mode_override("github", AuthenticationModes::BASIC),
    );
    fx.terminal.queue_prompt("Username", "jsquire");
    fx.terminal.queue_secret("Password", "password");
    fx.terminal.queue_prompt("Authentication code", "000000");

    fx.http
        .enqueue_with_headers(401, &[("X-GitHub-OTP", "required; app")], "");
    fx.http
        .enqueue_with_headers(401, &[("X-GitHub-OTP", "required; app")], "");

    let err = fx
        .provider
        .get_credential(
            &input(&[("protocol", "https"), ("host", "github.com")]),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        gitvault_common::error::Error::AuthenticationDeclined(_)
    ));
    assert_eq!(fx.http.request_count(), 2);
}

#[tokio::test]
async fn multiple_modes_show_a_menu_with_first_item_default() {
    let fx = fixture(Settings::for_testing().with_mode_override(
        "github",
        AuthenticationModes::PAT | AuthenticationModes::BASIC,
    ));
    fx.terminal.queue_prompt("option (enter for default)", "");
    fx.terminal.queue_secret("Token", "ghp_abc123");

    let credential = fx
        .provider
        .get_credential(
            &input(&[
                ("protocol", "https"),
                ("host", "github.com"),
                ("username", "jsquire"),
            ]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    // PAT is added to the menu before Basic, so it wins the default.
    assert_eq!(credential.secret, "ghp_abc123");
    assert!(
        fx.terminal
            .prompt_log()
            .contains(&"option (enter for default)".to_string())
    );
}

#[tokio::test]
async fn helper_is_invoked_with_mode_flags() {
    let fx = fixture_with_helper(
        Settings::for_testing().with_mode_override("github", AuthenticationModes::ALL),
        true,
    );
    fx.helper.enqueue(&[("mode", "pat"), ("pat", "ghp_from_helper")]);
    fx.http.enqueue_json(200, r#"{"login":"jsquire"}"#);

    let credential = fx
        .provider
        .get_credential(
            &input(&[("protocol", "https"), ("host", "github.com")]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(credential.account, "jsquire");
    assert_eq!(credential.secret, "ghp_from_helper");
    assert_eq!(fx.helper.command_line(0), "prompt --all");
}

#[tokio::test]
async fn helper_receives_enterprise_url_and_username() {
    let fx = fixture_with_helper(
        Settings::for_testing().with_mode_override("github", AuthenticationModes::PAT),
        true,
    );
    fx.helper.enqueue(&[("mode", "pat"), ("pat", "ghp_from_helper")]);

    fx.provider
        .get_credential(
            &input(&[
                ("protocol", "https"),
                ("host", "github.example.com"),
                ("username", "jsquire"),
            ]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        fx.helper.command_line(0),
        "prompt --pat --enterprise-url https://github.example.com/ --username jsquire"
    );
}

#[tokio::test]
async fn gist_credentials_share_the_parent_namespace() {
    let fx = fixture(Settings::for_testing());

    fx.provider
        .store_credential(&input(&[
            ("protocol", "https"),
            ("host", "gist.github.com"),
            ("username", "jsquire"),
            ("password", "token"),
        ]))
        .await
        .unwrap();

    assert!(
        fx.store
            .get("https://github.com", Some("jsquire"))
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn empty_store_requests_are_ignored() {
    let fx = fixture(Settings::for_testing());

    fx.provider
        .store_credential(&input(&[("protocol", "https"), ("host", "github.com")]))
        .await
        .unwrap();

    assert!(fx.store.is_empty());
}

#[tokio::test]
async fn erase_removes_the_stored_credential() {
    let fx = fixture(Settings::for_testing());
    fx.store
        .add_or_update("https://github.com", "jsquire", "token")
        .unwrap();

    fx.provider
        .erase_credential(&input(&[
            ("protocol", "https"),
            ("host", "github.com"),
            ("username", "jsquire"),
        ]))
        .await
        .unwrap();

    assert!(
        fx.store
            .get("https://github.com", Some("jsquire"))
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn interaction_disabled_fails_before_any_prompt() {
    let fx = fixture(
        Settings::for_testing()
            .with_interactive(false)
            .with_mode_override("github", AuthenticationModes::PAT),
    );

    let err = fx
        .provider
        .get_credential(
            &input(&[("protocol", "https"), ("host", "github.com")]),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        gitvault_common::error::Error::InteractionDisabled(_)
    ));
}

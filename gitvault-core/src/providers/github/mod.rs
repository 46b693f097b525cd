// =============================================================================
// gitvault-core/src/providers/github/mod.rs
// =============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use gitvault_common::error::Error;
use gitvault_common::models::auth::AuthenticationModes;
use gitvault_common::models::credential::Credential;
use gitvault_common::models::input::InputArguments;
use gitvault_common::traits::store_traits::CredentialStore;

use crate::auth::helper::HelperRunner;
use crate::auth::oauth2::BrowserLauncher;
use crate::auth::terminal::Terminal;
use crate::auth::HostProvider;
use crate::config::Settings;
use crate::http::{HttpClient, HttpResponse};
use crate::providers::is_empty_store_request;
use crate::store::normalize_service;

pub mod auth;
pub mod rest;

pub use auth::{GitHubAuthenticator, GitHubPromptResult};
pub use rest::{CreateTokenResult, GitHubMetaInfo, GitHubRestApi, GitHubUserInfo};

pub(crate) const GITHUB_BASE_HOST: &str = "github.com";
pub(crate) const GIST_BASE_HOST: &str = "gist.github.com";

/// OAuth application credentials; these identify the helper application,
/// not any user, and ship in every install.
pub(crate) const OAUTH_CLIENT_ID: &str = "0120e057bd645470c1ed";
pub(crate) const OAUTH_CLIENT_SECRET: &str = "18867509d956965542b521a529a79bb883344c90";

const OAUTH_SCOPES: &[&str] = &["repo", "gist", "workflow"];
const TOKEN_SCOPES: &[&str] = &["gist", "repo"];

/// Self-hosted instances older than this predate the deployed OAuth app.
const MIN_ENTERPRISE_OAUTH_VERSION: &str = "3.2.0";
const AE_VERSION_STRING: &str = "GitHub AE";

pub struct GitHubProvider {
    store: Arc<dyn CredentialStore>,
    settings: Arc<Settings>,
    rest: GitHubRestApi,
    auth: GitHubAuthenticator,
}

impl GitHubProvider {
    pub fn new(
        http: Arc<dyn HttpClient<Error = Error>>,
        store: Arc<dyn CredentialStore>,
        settings: Arc<Settings>,
        terminal: Arc<dyn Terminal>,
        browser: Arc<dyn BrowserLauncher>,
        helper: Arc<dyn HelperRunner>,
    ) -> Self {
        Self {
            store,
            settings: Arc::clone(&settings),
            rest: GitHubRestApi::new(Arc::clone(&http)),
            auth: GitHubAuthenticator::new(http, settings, terminal, browser, helper),
        }
    }

    pub fn is_github_dot_com(url: &Url) -> bool {
        url.host_str()
            .is_some_and(|h| h.eq_ignore_ascii_case(GITHUB_BASE_HOST))
    }

    /// Gist hosts are git-backed repositories living under the parent
    /// GitHub instance; their credentials share the parent's namespace.
    fn service_name(&self, input: &InputArguments) -> String {
        let host = input.host();
        let host = match host.split_once('.') {
            Some(("gist", rest)) => rest,
            _ => host,
        };
        normalize_service(&format!("{}://{}", input.protocol(), host))
    }

    pub async fn supported_modes(&self, remote: &Url) -> AuthenticationModes {
        if let Some(modes) = self.settings.authentication_modes_override("github") {
            debug!(%modes, "authentication modes override present");
            return modes;
        }

        // The SaaS host dropped password authentication in November 2020;
        // this is policy, not discovery.
        if Self::is_github_dot_com(remote) {
            return AuthenticationModes::BROWSER
                | AuthenticationModes::DEVICE
                | AuthenticationModes::PAT;
        }

        match self.rest.get_meta_info(remote).await {
            Ok(meta) => {
                let mut modes = AuthenticationModes::PAT;
                if meta.verifiable_password_authentication {
                    modes |= AuthenticationModes::BASIC;
                }
                let oauth_capable = match meta.installed_version.as_deref() {
                    Some(AE_VERSION_STRING) => true,
                    Some(version) => version_at_least(version, MIN_ENTERPRISE_OAUTH_VERSION),
                    None => false,
                };
                if oauth_capable {
                    modes |= AuthenticationModes::OAUTH;
                }
                debug!(version = meta.installed_version.as_deref().unwrap_or("unknown"),
                    %modes, "discovered enterprise authentication schemes");
                modes
            }
            Err(err) => {
                // Never block the user from attempting *some* method just
                // because discovery failed.
                warn!(
                    "failed to query '{}' for supported authentication schemes: {}; offering all",
                    remote, err
                );
                AuthenticationModes::ALL
            }
        }
    }

    async fn generate_credential(
        &self,
        input: &InputArguments,
        cancel: &CancellationToken,
    ) -> Result<Credential, Error> {
        if input.protocol().eq_ignore_ascii_case("http") {
            return Err(Error::Configuration(
                "Unencrypted HTTP is not supported for GitHub-family hosts. \
                 Ensure the repository remote URL is using HTTPS."
                    .to_string(),
            ));
        }

        let remote = input.remote_url()?;
        let service = self.service_name(input);
        let modes = self.supported_modes(&remote).await;

        match self
            .auth
            .get_authentication(&remote, input.username(), modes, cancel)
            .await?
        {
            GitHubPromptResult::Basic(basic) => {
                let cred = self
                    .generate_personal_access_token(&remote, &basic, cancel)
                    .await?;
                // Store now: if this token later needs SSO authorization on
                // the web, Git will fail without calling store/erase and the
                // user must be able to retry with the same token.
                self.store
                    .add_or_update(&service, &cred.account, &cred.secret)?;
                Ok(cred)
            }
            GitHubPromptResult::Pat(pat) => {
                // The host requires *some* username be echoed back to Git
                // even though tokens are anonymous-username.
                let account = if pat.account.is_empty() {
                    self.rest.get_user_info(&remote, &pat.secret).await?.login
                } else {
                    pat.account
                };
                Ok(Credential::new(account, pat.secret))
            }
            GitHubPromptResult::Browser => {
                let token = self
                    .auth
                    .get_oauth_token_via_browser(&remote, OAUTH_SCOPES, cancel)
                    .await?;
                let user = self.rest.get_user_info(&remote, &token.access_token).await?;
                Ok(Credential::new(user.login, token.access_token))
            }
            GitHubPromptResult::Device => {
                let token = self
                    .auth
                    .get_oauth_token_via_device(&remote, OAUTH_SCOPES, cancel)
                    .await?;
                let user = self.rest.get_user_info(&remote, &token.access_token).await?;
                Ok(Credential::new(user.login, token.access_token))
            }
        }
    }

    async fn generate_personal_access_token(
        &self,
        remote: &Url,
        basic: &Credential,
        cancel: &CancellationToken,
    ) -> Result<Credential, Error> {
        let first = self
            .rest
            .create_personal_access_token(remote, &basic.account, &basic.secret, None, TOKEN_SCOPES)
            .await?;

        let token = match first {
            CreateTokenResult::Success(token) => token,
            CreateTokenResult::TwoFactorRequired { sms } => {
                let code = self.auth.get_two_factor_code(remote, sms, cancel).await?;
                match self
                    .rest
                    .create_personal_access_token(
                        remote,
                        &basic.account,
                        &basic.secret,
                        Some(&code),
                        TOKEN_SCOPES,
                    )
                    .await?
                {
                    CreateTokenResult::Success(token) => token,
                    // One retry only; a second step-up failure is terminal.
                    _ => {
                        return Err(Error::AuthenticationDeclined(
                            "two-factor authentication failed".to_string(),
                        ));
                    }
                }
            }
            CreateTokenResult::Failure(message) => {
                return Err(Error::Auth(format!(
                    "interactive logon for '{}' failed: {}",
                    remote, message
                )));
            }
        };

        let user = self.rest.get_user_info(remote, &token).await?;
        Ok(Credential::new(user.login, token))
    }
}

#[async_trait]
impl HostProvider for GitHubProvider {
    fn id(&self) -> &'static str {
        "github"
    }

    fn name(&self) -> &'static str {
        "GitHub"
    }

    fn is_supported(&self, input: &InputArguments) -> bool {
        // HTTP is matched so we can show a useful error during credential
        // generation instead of silently falling through.
        if !input.protocol().eq_ignore_ascii_case("http")
            && !input.protocol().eq_ignore_ascii_case("https")
        {
            return false;
        }

        let host = input.host_name().to_lowercase();
        if host == GITHUB_BASE_HOST || host == GIST_BASE_HOST {
            return true;
        }

        let labels: Vec<&str> = host.split('.').collect();
        // github[.subdomain].domain.tld
        if labels.len() >= 3 && labels[0] == "github" {
            return true;
        }
        // gist.github[.subdomain].domain.tld
        if labels.len() >= 4 && labels[0] == "gist" && labels[1] == "github" {
            return true;
        }

        false
    }

    fn is_supported_response(&self, response: &HttpResponse) -> bool {
        // Both the SaaS host and self-hosted instances stamp this header.
        response.header("X-GitHub-Request-Id").is_some()
    }

    async fn get_credential(
        &self,
        input: &InputArguments,
        cancel: &CancellationToken,
    ) -> Result<Credential, Error> {
        let service = self.service_name(input);
        debug!(service, account = input.username().unwrap_or("<any>"),
            "looking for existing credential");

        if let Some(credential) = self.store.get(&service, input.username())? {
            debug!("existing credential found");
            return Ok(credential);
        }

        debug!("no existing credentials; creating a new one");
        self.generate_credential(input, cancel).await
    }

    async fn store_credential(&self, input: &InputArguments) -> Result<(), Error> {
        if is_empty_store_request(input) {
            debug!("not storing empty credential");
            return Ok(());
        }
        let service = self.service_name(input);
        self.store.add_or_update(
            &service,
            input.username().unwrap_or_default(),
            input.password().unwrap_or_default(),
        )
    }

    async fn erase_credential(&self, input: &InputArguments) -> Result<(), Error> {
        let service = self.service_name(input);
        if self.store.remove(&service, input.username())? {
            debug!(service, "credential erased");
        } else {
            debug!(service, "no credential to erase");
        }
        Ok(())
    }
}

/// Lexicographic-by-component version comparison; unparseable components
/// count as zero.
fn version_at_least(version: &str, minimum: &str) -> bool {
    fn parse(v: &str) -> Vec<u64> {
        v.split('.')
            .map(|part| {
                part.chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect::<String>()
                    .parse()
                    .unwrap_or(0)
            })
            .collect()
    }
    let (a, b) = (parse(version), parse(minimum));
    for i in 0..a.len().max(b.len()) {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        if x != y {
            return x > y;
        }
    }
    true
}

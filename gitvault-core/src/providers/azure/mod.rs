// =============================================================================
// gitvault-core/src/providers/azure/mod.rs
// =============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use gitvault_common::error::Error;
use gitvault_common::models::credential::Credential;
use gitvault_common::models::input::InputArguments;
use gitvault_common::traits::store_traits::CredentialStore;

use crate::auth::HostProvider;
use crate::auth::broker::IdentityBroker;
use crate::auth::oauth2::{BrowserLauncher, OAuth2Client, OAuth2ClientOptions};
use crate::auth::oidc::OidcClient;
use crate::auth::terminal::Terminal;
use crate::auth::{ensure_interaction_allowed, ensure_terminal_prompts_allowed};
use crate::cache::AuthorityCache;
use crate::config::Settings;
use crate::http::{HttpClient, HttpResponse};
use crate::providers::is_empty_store_request;
use crate::store::normalize_service;

pub mod rest;

pub use rest::AzureDevOpsRestApi;

pub(crate) const DEV_AZURE_HOST: &str = "dev.azure.com";
pub(crate) const VISUAL_STUDIO_SUFFIX: &str = ".visualstudio.com";

/// The resource scope every Azure DevOps access token needs.
const AZURE_DEVOPS_SCOPE: &str = "499b84ac-1321-427f-aa17-267ca6975798/.default";
/// First-party public client id usable with loopback redirects.
const CLIENT_ID: &str = "872cd9fa-d31f-45e0-9eab-6e460a02d1f1";

pub struct AzureReposProvider {
    http: Arc<dyn HttpClient<Error = Error>>,
    store: Arc<dyn CredentialStore>,
    settings: Arc<Settings>,
    terminal: Arc<dyn Terminal>,
    browser: Arc<dyn BrowserLauncher>,
    broker: Arc<dyn IdentityBroker>,
    authority_cache: Arc<AuthorityCache>,
    rest: AzureDevOpsRestApi,
}

impl AzureReposProvider {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        http: Arc<dyn HttpClient<Error = Error>>,
        store: Arc<dyn CredentialStore>,
        settings: Arc<Settings>,
        terminal: Arc<dyn Terminal>,
        browser: Arc<dyn BrowserLauncher>,
        broker: Arc<dyn IdentityBroker>,
        authority_cache: Arc<AuthorityCache>,
    ) -> Self {
        Self {
            rest: AzureDevOpsRestApi::new(Arc::clone(&http)),
            http,
            store,
            settings,
            terminal,
            browser,
            broker,
            authority_cache,
        }
    }

    /// The organization that owns a remote:
    /// `https://dev.azure.com/{org}/...` (the username part of the remote
    /// is the org for `org@dev.azure.com` style URLs), or the host prefix
    /// for classic `{org}.visualstudio.com` hosts.
    pub fn organization_name(input: &InputArguments) -> Result<String, Error> {
        let host = input.host_name().to_lowercase();

        if host == DEV_AZURE_HOST {
            if let Some(first) = input
                .path()
                .and_then(|p| p.trim_start_matches('/').split('/').next())
                .filter(|s| !s.is_empty())
            {
                return Ok(first.to_string());
            }
            if let Some(username) = input.username().filter(|u| !u.trim().is_empty()) {
                return Ok(username.to_string());
            }
            return Err(Error::Configuration(
                "cannot determine the Azure DevOps organization name from the request".to_string(),
            ));
        }

        if let Some(org) = host.strip_suffix(VISUAL_STUDIO_SUFFIX) {
            if !org.is_empty() {
                return Ok(org.to_string());
            }
        }

        Err(Error::Configuration(format!(
            "'{}' is not an Azure DevOps host",
            host
        )))
    }

    fn organization_url(input: &InputArguments, org: &str) -> String {
        let host = input.host_name().to_lowercase();
        if host == DEV_AZURE_HOST {
            format!("https://{}/{}", DEV_AZURE_HOST, org)
        } else {
            format!("https://{}", host)
        }
    }

    fn service_name(input: &InputArguments) -> Result<String, Error> {
        let org = Self::organization_name(input)?;
        Ok(normalize_service(&Self::organization_url(input, &org)))
    }

    async fn resolve_authority(&self, input: &InputArguments, org: &str) -> Result<String, Error> {
        debug!(org, "determining authentication authority");
        if let Some(authority) = self.authority_cache.get_authority(org).await? {
            debug!(org, authority, "authority found in cache");
            return Ok(authority);
        }

        let org_url = Self::organization_url(input, org);
        debug!(org, "no cached authority; querying {}", org_url);
        let authority = self.rest.get_authority(&org_url).await?;
        self.authority_cache.update_authority(org, &authority).await?;
        Ok(authority)
    }

    async fn acquire_access_token(
        &self,
        input: &InputArguments,
        authority: &str,
        cancel: &CancellationToken,
    ) -> Result<Credential, Error> {
        ensure_interaction_allowed(&self.settings)?;

        let scopes = vec![AZURE_DEVOPS_SCOPE.to_string()];

        // A native broker (where present and enabled) gives silent SSO and
        // owns its own token cache; otherwise fall back to OAuth via OIDC
        // discovery against the resolved authority.
        if self.settings.use_broker() && self.broker.is_available() {
            debug!("acquiring token via platform identity broker");
            let result = self
                .broker
                .acquire_token(authority, &scopes, input.username(), cancel)
                .await?;
            let account = result
                .account_upn
                .or_else(|| input.username().map(String::from))
                .unwrap_or_else(|| "AzureDevOps".to_string());
            return Ok(Credential::new(account, result.access_token));
        }

        let oidc = OidcClient::new(Arc::clone(&self.http), authority);
        let config = oidc.get_configuration().await?;

        let (Some(authorization_endpoint), Some(token_endpoint)) =
            (config.authorization_endpoint, config.token_endpoint)
        else {
            return Err(Error::Auth(format!(
                "authority '{}' does not advertise authorization and token endpoints",
                authority
            )));
        };

        let client = OAuth2Client::new(
            Arc::clone(&self.http),
            OAuth2ClientOptions {
                client_id: CLIENT_ID.to_string(),
                client_secret: None,
                authorization_endpoint,
                token_endpoint,
                device_authorization_endpoint: config.device_authorization_endpoint,
            },
        );

        let token = if self.settings.is_desktop_session() {
            self.terminal
                .write_line("info: please complete authentication in your browser...");
            let code = client
                .get_authorization_code(&scopes, self.browser.as_ref(), cancel)
                .await?;
            client.get_token_by_authorization_code(&code, cancel).await?
        } else {
            ensure_terminal_prompts_allowed(&self.settings)?;
            let device = client.get_device_code(&scopes, cancel).await?;
            self.terminal.write_line(&format!(
                "To complete authentication please visit {} and enter the following code:\n{}",
                device.verification_uri, device.user_code
            ));
            client.get_token_by_device_code(&device, cancel).await?
        };

        let account = input
            .username()
            .map(String::from)
            .unwrap_or_else(|| "AzureDevOps".to_string());
        Ok(Credential::new(account, token.access_token))
    }
}

#[async_trait]
impl HostProvider for AzureReposProvider {
    fn id(&self) -> &'static str {
        "azure-repos"
    }

    fn name(&self) -> &'static str {
        "Azure Repos"
    }

    fn is_supported(&self, input: &InputArguments) -> bool {
        if !input.protocol().eq_ignore_ascii_case("http")
            && !input.protocol().eq_ignore_ascii_case("https")
        {
            return false;
        }
        let host = input.host_name().to_lowercase();
        host == DEV_AZURE_HOST
            || (host.ends_with(VISUAL_STUDIO_SUFFIX)
                && host.len() > VISUAL_STUDIO_SUFFIX.len())
    }

    fn is_supported_response(&self, _response: &HttpResponse) -> bool {
        // Azure DevOps Server (on-prem TFS) is served by the generic
        // provider, so probe responses are never claimed here.
        false
    }

    async fn get_credential(
        &self,
        input: &InputArguments,
        cancel: &CancellationToken,
    ) -> Result<Credential, Error> {
        if input.protocol().eq_ignore_ascii_case("http") {
            return Err(Error::Configuration(
                "Unencrypted HTTP is not supported for Azure Repos. \
                 Ensure the repository remote URL is using HTTPS."
                    .to_string(),
            ));
        }

        let service = Self::service_name(input)?;
        if let Some(credential) = self.store.get(&service, input.username())? {
            debug!(service, "existing credential found");
            return Ok(credential);
        }

        let org = Self::organization_name(input)?;
        let authority = self.resolve_authority(input, &org).await?;
        debug!(org, authority, "authority resolved");

        self.acquire_access_token(input, &authority, cancel).await
    }

    async fn store_credential(&self, input: &InputArguments) -> Result<(), Error> {
        if is_empty_store_request(input) {
            debug!("not storing empty credential");
            return Ok(());
        }
        let service = Self::service_name(input)?;
        self.store.add_or_update(
            &service,
            input.username().unwrap_or_default(),
            input.password().unwrap_or_default(),
        )
    }

    async fn erase_credential(&self, input: &InputArguments) -> Result<(), Error> {
        let service = Self::service_name(input)?;
        self.store.remove(&service, input.username())?;

        // Git erases credentials after auth failures; a stale cached
        // authority may be the real culprit, so drop that too.
        let org = Self::organization_name(input)?;
        self.authority_cache.erase_authority(&org).await?;
        debug!(org, "erased credential and cached authority");
        Ok(())
    }
}

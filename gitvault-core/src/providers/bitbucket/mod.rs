// =============================================================================
// gitvault-core/src/providers/bitbucket/mod.rs
// =============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use gitvault_common::error::Error;
use gitvault_common::models::auth::AuthenticationModes;
use gitvault_common::models::credential::Credential;
use gitvault_common::models::input::InputArguments;
use gitvault_common::traits::store_traits::CredentialStore;

use crate::auth::HostProvider;
use crate::auth::helper::HelperRunner;
use crate::auth::oauth2::BrowserLauncher;
use crate::auth::terminal::Terminal;
use crate::config::Settings;
use crate::http::{HttpClient, HttpResponse};
use crate::providers::{is_empty_store_request, service_url};

pub mod auth;
pub mod rest;

pub use auth::{BitbucketAuthenticator, BitbucketPromptResult};
pub use rest::BitbucketRestApi;

pub(crate) const CLOUD_HOST: &str = "bitbucket.org";

pub(crate) const OAUTH_CLIENT_ID: &str = "HJdmKXV87DsmC9zSWB";
pub(crate) const OAUTH_CLIENT_SECRET: &str = "wwA6qPS3mZAyzKvQWJXgcnUpomyhM3Dw";

const REFRESH_TOKEN_SUFFIX: &str = "/refresh_token";

pub struct BitbucketProvider {
    store: Arc<dyn CredentialStore>,
    settings: Arc<Settings>,
    rest: BitbucketRestApi,
    auth: BitbucketAuthenticator,
}

impl BitbucketProvider {
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
            rest: BitbucketRestApi::new(Arc::clone(&http)),
            auth: BitbucketAuthenticator::new(http, settings, terminal, browser, helper),
        }
    }

    pub fn is_cloud_host(url: &Url) -> bool {
        url.host_str()
            .is_some_and(|h| h.eq_ignore_ascii_case(CLOUD_HOST))
    }

    fn supported_modes(&self, remote: &Url) -> AuthenticationModes {
        if let Some(modes) = self.settings.authentication_modes_override("bitbucket") {
            debug!(%modes, "authentication modes override present");
            return modes;
        }
        if Self::is_cloud_host(remote) {
            AuthenticationModes::BASIC | AuthenticationModes::BROWSER
        } else {
            // Server/DC installs have no deployed OAuth application we can
            // rely on; password (or HTTP token) auth is the lowest common
            // denominator.
            AuthenticationModes::BASIC
        }
    }

    fn refresh_service(service: &str) -> String {
        format!("{}{}", service, REFRESH_TOKEN_SUFFIX)
    }

    /// A stored refresh token lets us mint a fresh access token without
    /// prompting at all.
    async fn try_refresh(
        &self,
        remote: &Url,
        service: &str,
        username: Option<&str>,
        cancel: &CancellationToken,
    ) -> Option<Credential> {
        let refresh = self
            .store
            .get(&Self::refresh_service(service), username)
            .ok()??;

        let client = self.auth.oauth_client(remote);
        match client
            .get_token_by_refresh_token(&refresh.secret, cancel)
            .await
        {
            Ok(token) => {
                let account = match self.rest.get_user_info(&token.access_token).await {
                    Ok(user) => user.username,
                    Err(_) => refresh.account.clone(),
                };
                if let Some(new_refresh) = &token.refresh_token {
                    let _ = self.store.add_or_update(
                        &Self::refresh_service(service),
                        &account,
                        new_refresh,
                    );
                }
                Some(Credential::new(account, token.access_token))
            }
            Err(err) => {
                debug!("stored refresh token was not usable: {}", err);
                None
            }
        }
    }

    async fn generate_credential(
        &self,
        input: &InputArguments,
        cancel: &CancellationToken,
    ) -> Result<Credential, Error> {
        if input.protocol().eq_ignore_ascii_case("http")
            && Self::is_cloud_host(&input.remote_url()?)
        {
            return Err(Error::Configuration(
                "Unencrypted HTTP is not supported for Bitbucket. \
                 Ensure the repository remote URL is using HTTPS."
                    .to_string(),
            ));
        }

        let remote = input.remote_url()?;
        let service = service_url(input, false);
        let modes = self.supported_modes(&remote);

        match self
            .auth
            .get_credentials(&remote, input.username(), modes, cancel)
            .await?
        {
            BitbucketPromptResult::Basic(credential) => Ok(credential),
            BitbucketPromptResult::OAuth => {
                let token = self.auth.get_oauth_token(&remote, cancel).await?;
                let user = self.rest.get_user_info(&token.access_token).await?;

                // Persist the refresh token eagerly: the access token Git is
                // about to use is short-lived, and the next invocation should
                // renew silently instead of prompting again.
                if let Some(refresh) = &token.refresh_token {
                    self.store.add_or_update(
                        &Self::refresh_service(&service),
                        &user.username,
                        refresh,
                    )?;
                }

                Ok(Credential::new(user.username, token.access_token))
            }
        }
    }
}

#[async_trait]
impl HostProvider for BitbucketProvider {
    fn id(&self) -> &'static str {
        "bitbucket"
    }

    fn name(&self) -> &'static str {
        "Bitbucket"
    }

    fn is_supported(&self, input: &InputArguments) -> bool {
        if !input.protocol().eq_ignore_ascii_case("http")
            && !input.protocol().eq_ignore_ascii_case("https")
        {
            return false;
        }
        let host = input.host_name().to_lowercase();
        // bitbucket.org, or a self-hosted bitbucket.<domain> instance.
        host == CLOUD_HOST || host.split('.').next() == Some("bitbucket")
    }

    fn is_supported_response(&self, response: &HttpResponse) -> bool {
        // Bitbucket Server/DC stamps every response with a request id.
        response.header("X-AREQUESTID").is_some()
    }

    async fn get_credential(
        &self,
        input: &InputArguments,
        cancel: &CancellationToken,
    ) -> Result<Credential, Error> {
        let service = service_url(input, false);
        debug!(service, account = input.username().unwrap_or("<any>"),
            "looking for existing credential");

        if let Some(credential) = self.store.get(&service, input.username())? {
            debug!("existing credential found");
            return Ok(credential);
        }

        let remote = input.remote_url()?;
        if Self::is_cloud_host(&remote) {
            if let Some(credential) = self
                .try_refresh(&remote, &service, input.username(), cancel)
                .await
            {
                debug!("renewed credential from stored refresh token");
                return Ok(credential);
            }
        }

        debug!("no existing credentials; creating a new one");
        self.generate_credential(input, cancel).await
    }

    async fn store_credential(&self, input: &InputArguments) -> Result<(), Error> {
        if is_empty_store_request(input) {
            debug!("not storing empty credential");
            return Ok(());
        }
        let service = service_url(input, false);
        self.store.add_or_update(
            &service,
            input.username().unwrap_or_default(),
            input.password().unwrap_or_default(),
        )
    }

    async fn erase_credential(&self, input: &InputArguments) -> Result<(), Error> {
        let service = service_url(input, false);
        let removed = self.store.remove(&service, input.username())?;
        // A stale access token usually means the refresh token is stale too.
        let removed_refresh = self
            .store
            .remove(&Self::refresh_service(&service), input.username())?;
        if removed || removed_refresh {
            debug!(service, "credential erased");
        } else {
            debug!(service, "no credential to erase");
        }
        Ok(())
    }
}

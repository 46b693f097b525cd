// gitvault-core/src/providers/generic.rs
//
// The catch-all provider. Registered at low priority, it must never
// refuse a request: any host Git asks about can at least be served basic
// username/password prompts, and operators can wire explicit OAuth
// endpoints through the environment for hosts that support them.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use gitvault_common::error::Error;
use gitvault_common::models::credential::Credential;
use gitvault_common::models::input::InputArguments;
use gitvault_common::traits::store_traits::CredentialStore;

use crate::auth::HostProvider;
use crate::auth::oauth2::{BrowserLauncher, OAuth2Client, OAuth2ClientOptions};
use crate::auth::terminal::Terminal;
use crate::auth::{ensure_interaction_allowed, ensure_terminal_prompts_allowed};
use crate::config::Settings;
use crate::http::HttpClient;
use crate::providers::{is_empty_store_request, service_url};

pub struct GenericProvider {
    http: Arc<dyn HttpClient<Error = Error>>,
    store: Arc<dyn CredentialStore>,
    settings: Arc<Settings>,
    terminal: Arc<dyn Terminal>,
    browser: Arc<dyn BrowserLauncher>,
}

impl GenericProvider {
    pub fn new(
        http: Arc<dyn HttpClient<Error = Error>>,
        store: Arc<dyn CredentialStore>,
        settings: Arc<Settings>,
        terminal: Arc<dyn Terminal>,
        browser: Arc<dyn BrowserLauncher>,
    ) -> Self {
        Self {
            http,
            store,
            settings,
            terminal,
            browser,
        }
    }

    fn service_name(&self, input: &InputArguments) -> String {
        service_url(input, self.settings.use_http_path())
    }

    async fn generate_oauth_credential(
        &self,
        input: &InputArguments,
        cancel: &CancellationToken,
    ) -> Result<Option<Credential>, Error> {
        let Some(config) = self.settings.generic_oauth() else {
            return Ok(None);
        };

        ensure_interaction_allowed(&self.settings)?;
        debug!("using operator-configured OAuth endpoints for this host");

        let client = OAuth2Client::new(
            Arc::clone(&self.http),
            OAuth2ClientOptions {
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                authorization_endpoint: config.authorization_endpoint.clone(),
                token_endpoint: config.token_endpoint.clone(),
                device_authorization_endpoint: config.device_authorization_endpoint.clone(),
            },
        );

        let token = if self.settings.is_desktop_session() {
            self.terminal
                .write_line("info: please complete authentication in your browser...");
            let code = client
                .get_authorization_code(&config.scopes, self.browser.as_ref(), cancel)
                .await?;
            client.get_token_by_authorization_code(&code, cancel).await?
        } else {
            ensure_terminal_prompts_allowed(&self.settings)?;
            let device = client.get_device_code(&config.scopes, cancel).await?;
            self.terminal.write_line(&format!(
                "To complete authentication please visit {} and enter the following code:\n{}",
                device.verification_uri, device.user_code
            ));
            client.get_token_by_device_code(&device, cancel).await?
        };

        let account = input
            .username()
            .map(String::from)
            .unwrap_or_else(|| "OAUTH-USER".to_string());
        Ok(Some(Credential::new(account, token.access_token)))
    }

    fn prompt_basic(&self, input: &InputArguments) -> Result<Credential, Error> {
        ensure_interaction_allowed(&self.settings)?;
        ensure_terminal_prompts_allowed(&self.settings)?;

        let url = format!("{}://{}", input.protocol(), input.host());
        self.terminal
            .write_line(&format!("Enter credentials for '{}'...", url));

        let username = match input.username().filter(|u| !u.trim().is_empty()) {
            Some(existing) => {
                self.terminal.write_line(&format!("Username: {}", existing));
                existing.to_string()
            }
            None => self.terminal.prompt("Username")?,
        };
        let password = self.terminal.prompt_secret("Password")?;

        Ok(Credential::new(username, password))
    }
}

#[async_trait]
impl HostProvider for GenericProvider {
    fn id(&self) -> &'static str {
        "generic"
    }

    fn name(&self) -> &'static str {
        "Generic"
    }

    /// The ultimate fallback: claims everything.
    fn is_supported(&self, _input: &InputArguments) -> bool {
        true
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

        if let Some(credential) = self.generate_oauth_credential(input, cancel).await? {
            return Ok(credential);
        }

        self.prompt_basic(input)
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

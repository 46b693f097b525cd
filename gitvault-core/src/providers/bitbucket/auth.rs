// gitvault-core/src/providers/bitbucket/auth.rs
//
// Credential negotiation for Bitbucket-family hosts. The UI helper speaks
// the `userpass` command with `--url`, `--username` and `--show-oauth`
// flags; without a helper we fall back to a terminal menu of the permitted
// modes.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use url::Url;

use gitvault_common::error::Error;
use gitvault_common::models::auth::AuthenticationModes;
use gitvault_common::models::credential::Credential;
use gitvault_common::models::oauth::OAuth2TokenResult;

use crate::auth::helper::{self, HelperRunner};
use crate::auth::oauth2::{BrowserLauncher, OAuth2Client, OAuth2ClientOptions};
use crate::auth::terminal::{Terminal, TerminalMenu};
use crate::auth::{ensure_interaction_allowed, ensure_terminal_prompts_allowed};
use crate::config::Settings;
use crate::http::HttpClient;

use super::{BitbucketProvider, CLOUD_HOST, OAUTH_CLIENT_ID, OAUTH_CLIENT_SECRET};

const DEFAULT_HELPER_NAME: &str = "gitvault-bitbucket-ui";

const OAUTH_SCOPES: &[&str] = &["repository", "repository:write"];

#[derive(Debug)]
pub enum BitbucketPromptResult {
    Basic(Credential),
    OAuth,
}

pub struct BitbucketAuthenticator {
    http: Arc<dyn HttpClient<Error = Error>>,
    settings: Arc<Settings>,
    terminal: Arc<dyn Terminal>,
    browser: Arc<dyn BrowserLauncher>,
    helper: Arc<dyn HelperRunner>,
}

impl BitbucketAuthenticator {
    pub fn new(
        http: Arc<dyn HttpClient<Error = Error>>,
        settings: Arc<Settings>,
        terminal: Arc<dyn Terminal>,
        browser: Arc<dyn BrowserLauncher>,
        helper: Arc<dyn HelperRunner>,
    ) -> Self {
        Self {
            http,
            settings,
            terminal,
            browser,
            helper,
        }
    }

    pub(crate) fn oauth_client(&self, remote: &Url) -> OAuth2Client {
        let host = remote.host_str().unwrap_or(CLOUD_HOST);
        let base = format!("https://{}", host);
        OAuth2Client::new(
            Arc::clone(&self.http),
            OAuth2ClientOptions {
                client_id: OAUTH_CLIENT_ID.to_string(),
                client_secret: Some(OAUTH_CLIENT_SECRET.to_string()),
                authorization_endpoint: format!("{}/site/oauth2/authorize", base),
                token_endpoint: format!("{}/site/oauth2/access_token", base),
                device_authorization_endpoint: None,
            },
        )
    }

    fn find_helper(&self) -> Option<String> {
        helper::find_helper(
            self.settings.helper_override("bitbucket"),
            DEFAULT_HELPER_NAME,
        )
        .map(|p| p.to_string_lossy().into_owned())
    }

    pub async fn get_credentials(
        &self,
        remote: &Url,
        username: Option<&str>,
        modes: AuthenticationModes,
        cancel: &CancellationToken,
    ) -> Result<BitbucketPromptResult, Error> {
        ensure_interaction_allowed(&self.settings)?;

        if modes.is_none() {
            return Err(Error::Auth(
                "at least one authentication mode must be offered".to_string(),
            ));
        }

        let offer_oauth =
            modes.contains(AuthenticationModes::BROWSER) && self.settings.is_desktop_session();

        if let Some(helper_path) = self.find_helper() {
            let mut args = vec!["userpass".to_string()];
            if !BitbucketProvider::is_cloud_host(remote) {
                args.push("--url".to_string());
                args.push(remote.to_string());
            }
            if let Some(username) = username.filter(|u| !u.trim().is_empty()) {
                args.push("--username".to_string());
                args.push(username.to_string());
            }
            if offer_oauth {
                args.push("--show-oauth".to_string());
            }

            let result = self.helper.invoke(&helper_path, &args, None, cancel).await?;

            if helper::is_truthy(result.get("oauth")) {
                return Ok(BitbucketPromptResult::OAuth);
            }

            let username = result.get("username").ok_or_else(|| {
                Error::Helper("missing 'username' in helper response".to_string())
            })?;
            let password = result.get("password").ok_or_else(|| {
                Error::Helper("missing 'password' in helper response".to_string())
            })?;
            return Ok(BitbucketPromptResult::Basic(Credential::new(
                username.clone(),
                password.clone(),
            )));
        }

        ensure_terminal_prompts_allowed(&self.settings)?;

        let use_oauth = if offer_oauth {
            if modes.contains(AuthenticationModes::BASIC) {
                let title = format!("Select an authentication method for '{}'", remote);
                let mut menu = TerminalMenu::new(self.terminal.as_ref(), title);
                let oauth_item = menu.add("Web browser");
                menu.add("Username/password");
                menu.show(0)? == oauth_item
            } else {
                true
            }
        } else {
            false
        };

        if use_oauth {
            return Ok(BitbucketPromptResult::OAuth);
        }

        self.terminal
            .write_line(&format!("Enter Bitbucket credentials for '{}'...", remote));
        let username = match username.filter(|u| !u.trim().is_empty()) {
            Some(existing) => {
                self.terminal.write_line(&format!("Username: {}", existing));
                existing.to_string()
            }
            None => self.terminal.prompt("Username")?,
        };
        let password = self.terminal.prompt_secret("Password")?;
        Ok(BitbucketPromptResult::Basic(Credential::new(
            username, password,
        )))
    }

    pub async fn get_oauth_token(
        &self,
        remote: &Url,
        cancel: &CancellationToken,
    ) -> Result<OAuth2TokenResult, Error> {
        ensure_interaction_allowed(&self.settings)?;

        if !self.settings.is_desktop_session() {
            return Err(Error::Auth(
                "cannot launch a web browser without an interactive desktop session".to_string(),
            ));
        }

        let client = self.oauth_client(remote);
        let scopes: Vec<String> = OAUTH_SCOPES.iter().map(|s| s.to_string()).collect();

        self.terminal
            .write_line("info: please complete authentication in your browser...");

        let auth_code = client
            .get_authorization_code(&scopes, self.browser.as_ref(), cancel)
            .await?;
        client.get_token_by_authorization_code(&auth_code, cancel).await
    }
}

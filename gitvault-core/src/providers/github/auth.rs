// gitvault-core/src/providers/github/auth.rs
//
// Authentication negotiation for GitHub-family hosts: either delegate to a
// UI helper executable, or fall back to terminal prompts with a numbered
// menu when more than one mode is on offer.

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

use super::{GITHUB_BASE_HOST, GitHubProvider, OAUTH_CLIENT_ID, OAUTH_CLIENT_SECRET};

const DEFAULT_HELPER_NAME: &str = "gitvault-github-ui";

#[derive(Debug)]
pub enum GitHubPromptResult {
    /// Username/password collected; the provider exchanges them for a PAT.
    Basic(Credential),
    /// A personal access token, possibly with an empty account to resolve.
    Pat(Credential),
    Browser,
    Device,
}

pub struct GitHubAuthenticator {
    http: Arc<dyn HttpClient<Error = Error>>,
    settings: Arc<Settings>,
    terminal: Arc<dyn Terminal>,
    browser: Arc<dyn BrowserLauncher>,
    helper: Arc<dyn HelperRunner>,
}

impl GitHubAuthenticator {
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

    fn oauth_client(&self, remote: &Url) -> OAuth2Client {
        let host = remote.host_str().unwrap_or(GITHUB_BASE_HOST);
        let base = format!("https://{}", host);
        OAuth2Client::new(
            Arc::clone(&self.http),
            OAuth2ClientOptions {
                client_id: OAUTH_CLIENT_ID.to_string(),
                client_secret: Some(OAUTH_CLIENT_SECRET.to_string()),
                authorization_endpoint: format!("{}/login/oauth/authorize", base),
                token_endpoint: format!("{}/login/oauth/access_token", base),
                device_authorization_endpoint: Some(format!("{}/login/device/code", base)),
            },
        )
    }

    fn find_helper(&self) -> Option<String> {
        helper::find_helper(self.settings.helper_override("github"), DEFAULT_HELPER_NAME)
            .map(|p| p.to_string_lossy().into_owned())
    }

    pub async fn get_authentication(
        &self,
        remote: &Url,
        username: Option<&str>,
        modes: AuthenticationModes,
        cancel: &CancellationToken,
    ) -> Result<GitHubPromptResult, Error> {
        ensure_interaction_allowed(&self.settings)?;

        if modes.is_none() {
            return Err(Error::Auth(
                "at least one authentication mode must be offered".to_string(),
            ));
        }

        if let Some(helper_path) = self.find_helper() {
            return self
                .prompt_via_helper(&helper_path, remote, username, modes, cancel)
                .await;
        }

        ensure_terminal_prompts_allowed(&self.settings)?;
        self.prompt_via_terminal(remote, username, modes)
    }

    async fn prompt_via_helper(
        &self,
        helper_path: &str,
        remote: &Url,
        username: Option<&str>,
        modes: AuthenticationModes,
        cancel: &CancellationToken,
    ) -> Result<GitHubPromptResult, Error> {
        let mut args = vec!["prompt".to_string()];
        if modes == AuthenticationModes::ALL {
            args.push("--all".to_string());
        } else {
            if modes.contains(AuthenticationModes::BASIC) {
                args.push("--basic".to_string());
            }
            if modes.contains(AuthenticationModes::BROWSER) {
                args.push("--browser".to_string());
            }
            if modes.contains(AuthenticationModes::DEVICE) {
                args.push("--device".to_string());
            }
            if modes.contains(AuthenticationModes::PAT) {
                args.push("--pat".to_string());
            }
        }
        if !GitHubProvider::is_github_dot_com(remote) {
            args.push("--enterprise-url".to_string());
            args.push(remote.to_string());
        }
        if let Some(username) = username.filter(|u| !u.trim().is_empty()) {
            args.push("--username".to_string());
            args.push(username.to_string());
        }

        let result = self.helper.invoke(helper_path, &args, None, cancel).await?;

        let mode = result
            .get("mode")
            .ok_or_else(|| Error::Helper("missing 'mode' in helper response".to_string()))?;

        match mode.to_lowercase().as_str() {
            "pat" => {
                let pat = result
                    .get("pat")
                    .ok_or_else(|| Error::Helper("missing 'pat' in helper response".to_string()))?;
                Ok(GitHubPromptResult::Pat(Credential::new(
                    username.unwrap_or_default(),
                    pat.clone(),
                )))
            }
            "browser" => Ok(GitHubPromptResult::Browser),
            "device" => Ok(GitHubPromptResult::Device),
            "basic" => {
                let username = result.get("username").ok_or_else(|| {
                    Error::Helper("missing 'username' in helper response".to_string())
                })?;
                let password = result.get("password").ok_or_else(|| {
                    Error::Helper("missing 'password' in helper response".to_string())
                })?;
                Ok(GitHubPromptResult::Basic(Credential::new(
                    username.clone(),
                    password.clone(),
                )))
            }
            other => Err(Error::Helper(format!(
                "unknown mode value in helper response '{}'",
                other
            ))),
        }
    }

    fn prompt_via_terminal(
        &self,
        remote: &Url,
        username: Option<&str>,
        modes: AuthenticationModes,
    ) -> Result<GitHubPromptResult, Error> {
        #[derive(Clone, Copy, PartialEq)]
        enum Choice {
            Basic,
            Browser,
            Device,
            Pat,
        }

        let choice = if modes.count() == 1 {
            if modes.contains(AuthenticationModes::BASIC) {
                Choice::Basic
            } else if modes.contains(AuthenticationModes::BROWSER) {
                Choice::Browser
            } else if modes.contains(AuthenticationModes::DEVICE) {
                Choice::Device
            } else {
                Choice::Pat
            }
        } else {
            let title = format!("Select an authentication method for '{}'", remote);
            let mut menu = TerminalMenu::new(self.terminal.as_ref(), title);
            let mut items = Vec::new();

            // The web browser is only worth offering in a desktop session.
            if self.settings.is_desktop_session() && modes.contains(AuthenticationModes::BROWSER) {
                items.push((menu.add("Web browser"), Choice::Browser));
            }
            if modes.contains(AuthenticationModes::DEVICE) {
                items.push((menu.add("Device code"), Choice::Device));
            }
            if modes.contains(AuthenticationModes::PAT) {
                items.push((menu.add("Personal access token"), Choice::Pat));
            }
            if modes.contains(AuthenticationModes::BASIC) {
                items.push((menu.add("Username/password"), Choice::Basic));
            }

            if items.is_empty() {
                return Err(Error::Auth(
                    "no offered authentication mode is usable in this session".to_string(),
                ));
            }

            let selected = menu.show(0)?;
            items
                .iter()
                .find(|(index, _)| *index == selected)
                .map(|(_, choice)| *choice)
                .expect("menu returned an index we did not add")
        };

        match choice {
            Choice::Basic => {
                self.terminal
                    .write_line(&format!("Enter GitHub credentials for '{}'...", remote));
                let username = match username.filter(|u| !u.trim().is_empty()) {
                    Some(existing) => {
                        self.terminal.write_line(&format!("Username: {}", existing));
                        existing.to_string()
                    }
                    None => self.terminal.prompt("Username")?,
                };
                let password = self.terminal.prompt_secret("Password")?;
                Ok(GitHubPromptResult::Basic(Credential::new(username, password)))
            }
            Choice::Browser => Ok(GitHubPromptResult::Browser),
            Choice::Device => Ok(GitHubPromptResult::Device),
            Choice::Pat => {
                self.terminal.write_line(&format!(
                    "Enter GitHub personal access token for '{}'...",
                    remote
                ));
                let token = self.terminal.prompt_secret("Token")?;
                Ok(GitHubPromptResult::Pat(Credential::new(
                    username.unwrap_or_default(),
                    token,
                )))
            }
        }
    }

    pub async fn get_two_factor_code(
        &self,
        _remote: &Url,
        is_sms: bool,
        cancel: &CancellationToken,
    ) -> Result<String, Error> {
        ensure_interaction_allowed(&self.settings)?;

        if let Some(helper_path) = self.find_helper() {
            let mut args = vec!["2fa".to_string()];
            if is_sms {
                args.push("--sms".to_string());
            }
            let result = self.helper.invoke(&helper_path, &args, None, cancel).await?;
            return result
                .get("code")
                .cloned()
                .ok_or_else(|| Error::Helper("missing 'code' in helper response".to_string()));
        }

        ensure_terminal_prompts_allowed(&self.settings)?;

        self.terminal.write_line(
            "Two-factor authentication is enabled and an authentication code is required.",
        );
        if is_sms {
            self.terminal.write_line(
                "An SMS containing the authentication code has been sent to your registered device.",
            );
        } else {
            self.terminal.write_line(
                "Use your registered authentication app to generate an authentication code.",
            );
        }
        self.terminal.prompt("Authentication code")
    }

    pub async fn get_oauth_token_via_browser(
        &self,
        remote: &Url,
        scopes: &[&str],
        cancel: &CancellationToken,
    ) -> Result<OAuth2TokenResult, Error> {
        ensure_interaction_allowed(&self.settings)?;

        if !self.settings.is_desktop_session() {
            return Err(Error::Auth(
                "cannot launch a web browser without an interactive desktop session".to_string(),
            ));
        }

        let client = self.oauth_client(remote);
        let scopes: Vec<String> = scopes.iter().map(|s| s.to_string()).collect();

        self.terminal
            .write_line("info: please complete authentication in your browser...");

        let auth_code = client
            .get_authorization_code(&scopes, self.browser.as_ref(), cancel)
            .await?;
        client.get_token_by_authorization_code(&auth_code, cancel).await
    }

    pub async fn get_oauth_token_via_device(
        &self,
        remote: &Url,
        scopes: &[&str],
        cancel: &CancellationToken,
    ) -> Result<OAuth2TokenResult, Error> {
        ensure_interaction_allowed(&self.settings)?;

        let client = self.oauth_client(remote);
        let scopes: Vec<String> = scopes.iter().map(|s| s.to_string()).collect();

        let device = client.get_device_code(&scopes, cancel).await?;

        // Polling races against the code display: dismissing the helper
        // dialog cancels the poll via a child token.
        let poll_cancel = cancel.child_token();

        if let Some(helper_path) = self.find_helper() {
            let args = vec![
                "device".to_string(),
                device.user_code.clone(),
                device.verification_uri.clone(),
            ];
            let runner = Arc::clone(&self.helper);
            let dismiss = poll_cancel.clone();
            let helper_cancel = poll_cancel.clone();
            tokio::spawn(async move {
                match runner.invoke(&helper_path, &args, None, &helper_cancel).await {
                    Ok(result) => {
                        if helper::is_truthy(result.get("cancel")) {
                            dismiss.cancel();
                        }
                    }
                    Err(_) => dismiss.cancel(),
                }
            });
        } else {
            ensure_terminal_prompts_allowed(&self.settings)?;
            self.terminal.write_line(&format!(
                "To complete authentication please visit {} and enter the following code:\n{}",
                device.verification_uri, device.user_code
            ));
        }

        client.get_token_by_device_code(&device, &poll_cancel).await
    }
}

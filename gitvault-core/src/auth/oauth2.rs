// gitvault-core/src/auth/oauth2.rs
//
// OAuth 2.0 client: authorization-code (with PKCE + loopback redirect),
// device-code, and refresh-token grants against a provider's endpoints.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::distr::{Alphanumeric, SampleString};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use gitvault_common::error::Error;
use gitvault_common::models::oauth::{
    AuthorizationCodeResult, OAuth2DeviceCodeResult, OAuth2TokenResult,
};

use crate::auth::callback_server::start_callback_server;
use crate::http::{HttpClient, body_snippet};

/// Inactivity timeout for the browser leg of the authorization-code flow.
/// No protocol-mandated value exists, but the wait must be finite.
const BROWSER_FLOW_TIMEOUT: Duration = Duration::from_secs(300);

const DEFAULT_DEVICE_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// `slow_down` asks us to add 5 seconds to the current interval (RFC 8628).
const SLOW_DOWN_BACKOFF: Duration = Duration::from_secs(5);

/// Launches the system browser. A trait seam so flows can be tested
/// without opening anything.
pub trait BrowserLauncher: Send + Sync {
    fn open(&self, url: &str) -> Result<(), Error>;
}

pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> Result<(), Error> {
        open::that(url).map_err(|e| Error::Auth(format!("failed to launch browser: {}", e)))
    }
}

#[derive(Debug, Clone)]
pub struct OAuth2ClientOptions {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub device_authorization_endpoint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<u64>,
    refresh_token: Option<String>,
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeviceAuthorizationResponse {
    device_code: Option<String>,
    user_code: Option<String>,
    verification_uri: Option<String>,
    expires_in: Option<u64>,
    interval: Option<u64>,
}

/// One token endpoint round trip either yields tokens or a protocol-level
/// error code (which the device flow inspects to keep polling).
enum TokenOutcome {
    Success(OAuth2TokenResult),
    OAuthError {
        error: String,
        description: Option<String>,
    },
}

pub struct OAuth2Client {
    http: Arc<dyn HttpClient<Error = Error>>,
    options: OAuth2ClientOptions,
}

impl OAuth2Client {
    pub fn new(http: Arc<dyn HttpClient<Error = Error>>, options: OAuth2ClientOptions) -> Self {
        Self { http, options }
    }

    fn generate_state() -> String {
        Alphanumeric.sample_string(&mut rand::rng(), 16)
    }

    pub(crate) fn generate_code_verifier() -> String {
        // 96 random alphanumeric characters is comfortably inside the
        // RFC 7636 43..128 length window.
        Alphanumeric.sample_string(&mut rand::rng(), 96)
    }

    pub(crate) fn code_challenge(verifier: &str) -> String {
        let digest = Sha256::digest(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }

    fn authorization_url(
        &self,
        scopes: &[String],
        redirect_uri: &str,
        state: &str,
        code_challenge: &str,
    ) -> String {
        let scope_str = scopes.join(" ");
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}&code_challenge={}&code_challenge_method=S256",
            self.options.authorization_endpoint,
            urlencoding::encode(&self.options.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scope_str),
            urlencoding::encode(state),
            urlencoding::encode(code_challenge),
        )
    }

    /// Runs the browser leg of the authorization-code flow: starts a
    /// loopback listener on an ephemeral port, opens the system browser at
    /// the authorization endpoint, awaits exactly one redirect, validates
    /// the `state` parameter and extracts the code.
    pub async fn get_authorization_code(
        &self,
        scopes: &[String],
        browser: &dyn BrowserLauncher,
        cancel: &CancellationToken,
    ) -> Result<AuthorizationCodeResult, Error> {
        let state = Self::generate_state();
        let verifier = Self::generate_code_verifier();
        let challenge = Self::code_challenge(&verifier);

        let (port, done_rx, shutdown_tx) = start_callback_server(0).await?;
        let redirect_uri = format!("http://127.0.0.1:{}/", port);

        let url = self.authorization_url(scopes, &redirect_uri, &state, &challenge);
        debug!("launching browser for authorization endpoint");
        browser.open(&url)?;

        let result = tokio::select! {
            r = done_rx => {
                r.map_err(|_| Error::Auth("authorization callback channel closed".to_string()))?
            }
            _ = cancel.cancelled() => {
                let _ = shutdown_tx.send(());
                return Err(Error::Cancelled("authorization code flow".to_string()));
            }
            _ = tokio::time::sleep(BROWSER_FLOW_TIMEOUT) => {
                let _ = shutdown_tx.send(());
                return Err(Error::Auth(
                    "timed out waiting for the browser authorization response".to_string(),
                ));
            }
        };
        let _ = shutdown_tx.send(());

        if let Some(error) = result.error {
            return Err(Error::AuthenticationDeclined(format!(
                "{}: {}",
                error,
                result.error_description.unwrap_or_default()
            )));
        }

        if result.state.as_deref() != Some(state.as_str()) {
            return Err(Error::Auth(
                "authorization response state parameter mismatch".to_string(),
            ));
        }

        let code = result
            .code
            .ok_or_else(|| Error::Auth("authorization response is missing a code".to_string()))?;

        Ok(AuthorizationCodeResult {
            code,
            code_verifier: verifier,
            redirect_uri,
        })
    }

    pub async fn get_token_by_authorization_code(
        &self,
        auth_code: &AuthorizationCodeResult,
        cancel: &CancellationToken,
    ) -> Result<OAuth2TokenResult, Error> {
        let mut params = vec![
            ("grant_type".to_string(), "authorization_code".to_string()),
            ("code".to_string(), auth_code.code.clone()),
            ("client_id".to_string(), self.options.client_id.clone()),
            ("redirect_uri".to_string(), auth_code.redirect_uri.clone()),
            (
                "code_verifier".to_string(),
                auth_code.code_verifier.clone(),
            ),
        ];
        if let Some(secret) = &self.options.client_secret {
            params.push(("client_secret".to_string(), secret.clone()));
        }

        match self.token_round_trip(params, cancel).await? {
            TokenOutcome::Success(token) => Ok(token),
            TokenOutcome::OAuthError { error, description } => Err(Error::Endpoint {
                url: self.options.token_endpoint.clone(),
                status: 400,
                message: format!("{}: {}", error, description.unwrap_or_default()),
            }),
        }
    }

    pub async fn get_device_code(
        &self,
        scopes: &[String],
        cancel: &CancellationToken,
    ) -> Result<OAuth2DeviceCodeResult, Error> {
        let endpoint = self
            .options
            .device_authorization_endpoint
            .clone()
            .ok_or_else(|| {
                Error::Configuration(
                    "this host has no device authorization endpoint configured".to_string(),
                )
            })?;

        let params = vec![
            ("client_id".to_string(), self.options.client_id.clone()),
            ("scope".to_string(), scopes.join(" ")),
        ];

        let response = tokio::select! {
            r = self.http.post_form(endpoint.clone(), params, json_accept_headers()) => r?,
            _ = cancel.cancelled() => {
                return Err(Error::Cancelled("device authorization request".to_string()));
            }
        };

        if !response.is_success() {
            return Err(Error::Endpoint {
                url: endpoint,
                status: response.status,
                message: body_snippet(&response.body),
            });
        }

        let parsed: DeviceAuthorizationResponse = serde_json::from_str(&response.body)?;
        let (Some(device_code), Some(user_code), Some(verification_uri)) =
            (parsed.device_code, parsed.user_code, parsed.verification_uri)
        else {
            return Err(Error::Endpoint {
                url: endpoint,
                status: response.status,
                message: "device authorization response is missing required fields".to_string(),
            });
        };

        Ok(OAuth2DeviceCodeResult {
            device_code,
            user_code,
            verification_uri,
            polling_interval: parsed
                .interval
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_DEVICE_POLL_INTERVAL),
            expires_in: parsed.expires_in.map(Duration::from_secs),
        })
    }

    /// Polls the token endpoint at the server-specified interval until the
    /// user completes (or declines) the device flow, the code expires, or
    /// `cancel` fires. `authorization_pending` continues polling;
    /// `slow_down` widens the interval.
    pub async fn get_token_by_device_code(
        &self,
        device: &OAuth2DeviceCodeResult,
        cancel: &CancellationToken,
    ) -> Result<OAuth2TokenResult, Error> {
        let mut interval = device.polling_interval;
        let deadline = device
            .expires_in
            .map(|d| tokio::time::Instant::now() + d);

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = cancel.cancelled() => {
                    return Err(Error::Cancelled("device code polling".to_string()));
                }
            }

            if let Some(deadline) = deadline {
                if tokio::time::Instant::now() >= deadline {
                    return Err(Error::AuthenticationDeclined(
                        "the device code expired before authorization completed".to_string(),
                    ));
                }
            }

            let params = vec![
                (
                    "grant_type".to_string(),
                    "urn:ietf:params:oauth:grant-type:device_code".to_string(),
                ),
                ("device_code".to_string(), device.device_code.clone()),
                ("client_id".to_string(), self.options.client_id.clone()),
            ];

            match self.token_round_trip(params, cancel).await? {
                TokenOutcome::Success(token) => return Ok(token),
                TokenOutcome::OAuthError { error, description } => match error.as_str() {
                    "authorization_pending" => continue,
                    "slow_down" => {
                        interval += SLOW_DOWN_BACKOFF;
                        debug!("token endpoint asked us to slow down; interval is now {:?}", interval);
                        continue;
                    }
                    "access_denied" => {
                        return Err(Error::AuthenticationDeclined(
                            "the user declined the device authorization request".to_string(),
                        ));
                    }
                    "expired_token" => {
                        return Err(Error::AuthenticationDeclined(
                            "the device code expired before authorization completed".to_string(),
                        ));
                    }
                    _ => {
                        return Err(Error::Endpoint {
                            url: self.options.token_endpoint.clone(),
                            status: 400,
                            message: format!("{}: {}", error, description.unwrap_or_default()),
                        });
                    }
                },
            }
        }
    }

    pub async fn get_token_by_refresh_token(
        &self,
        refresh_token: &str,
        cancel: &CancellationToken,
    ) -> Result<OAuth2TokenResult, Error> {
        let mut params = vec![
            ("grant_type".to_string(), "refresh_token".to_string()),
            ("refresh_token".to_string(), refresh_token.to_string()),
            ("client_id".to_string(), self.options.client_id.clone()),
        ];
        if let Some(secret) = &self.options.client_secret {
            params.push(("client_secret".to_string(), secret.clone()));
        }

        match self.token_round_trip(params, cancel).await? {
            TokenOutcome::Success(token) => Ok(token),
            TokenOutcome::OAuthError { error, description } => Err(Error::Endpoint {
                url: self.options.token_endpoint.clone(),
                status: 400,
                message: format!("{}: {}", error, description.unwrap_or_default()),
            }),
        }
    }

    async fn token_round_trip(
        &self,
        params: Vec<(String, String)>,
        cancel: &CancellationToken,
    ) -> Result<TokenOutcome, Error> {
        let url = self.options.token_endpoint.clone();
        let response = tokio::select! {
            r = self.http.post_form(url.clone(), params, json_accept_headers()) => r?,
            _ = cancel.cancelled() => {
                return Err(Error::Cancelled("token endpoint request".to_string()));
            }
        };

        // A JSON `error` field wins over the HTTP status: some servers
        // return protocol errors with 200, others with 400.
        if let Ok(err) = serde_json::from_str::<TokenErrorResponse>(&response.body) {
            return Ok(TokenOutcome::OAuthError {
                error: err.error,
                description: err.error_description,
            });
        }

        if !response.is_success() {
            return Err(Error::Endpoint {
                url,
                status: response.status,
                message: body_snippet(&response.body),
            });
        }

        let parsed: TokenEndpointResponse = serde_json::from_str(&response.body)?;
        let (Some(access_token), Some(token_type)) = (parsed.access_token, parsed.token_type)
        else {
            return Err(Error::Endpoint {
                url,
                status: response.status,
                message: "token response is missing access_token or token_type".to_string(),
            });
        };

        Ok(TokenOutcome::Success(OAuth2TokenResult {
            access_token,
            token_type,
            refresh_token: parsed.refresh_token,
            expires_in: parsed.expires_in.map(Duration::from_secs),
            scopes: parsed
                .scope
                .map(|s| s.split(' ').map(String::from).collect()),
        }))
    }
}

fn json_accept_headers() -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert("Accept".to_string(), "application/json".to_string());
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_challenge_matches_rfc7636_vector() {
        // Appendix B of RFC 7636.
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            OAuth2Client::code_challenge(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn code_verifier_length_is_valid() {
        let verifier = OAuth2Client::generate_code_verifier();
        assert!(verifier.len() >= 43 && verifier.len() <= 128);
    }
}

// gitvault-core/src/providers/github/rest.rs

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;
use url::Url;

use gitvault_common::error::Error;

use crate::http::{HttpClient, basic_auth_header, body_snippet};

use super::{GIST_BASE_HOST, GITHUB_BASE_HOST};

/// Capability metadata for an instance (`/meta`).
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubMetaInfo {
    #[serde(default)]
    pub verifiable_password_authentication: bool,
    pub installed_version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubUserInfo {
    pub login: String,
}

#[derive(Debug, Deserialize)]
struct CreateTokenResponse {
    token: Option<String>,
}

#[derive(Debug)]
pub enum CreateTokenResult {
    Success(String),
    /// The server wants a one-time code (authenticator app or SMS).
    TwoFactorRequired {
        sms: bool,
    },
    Failure(String),
}

pub struct GitHubRestApi {
    http: Arc<dyn HttpClient<Error = Error>>,
}

impl GitHubRestApi {
    pub fn new(http: Arc<dyn HttpClient<Error = Error>>) -> Self {
        Self { http }
    }

    fn api_base(remote: &Url) -> String {
        match remote.host_str() {
            Some(host)
                if host.eq_ignore_ascii_case(GITHUB_BASE_HOST)
                    || host.eq_ignore_ascii_case(GIST_BASE_HOST) =>
            {
                "https://api.github.com".to_string()
            }
            Some(host) => format!("https://{}/api/v3", host),
            None => "https://api.github.com".to_string(),
        }
    }

    pub async fn get_meta_info(&self, remote: &Url) -> Result<GitHubMetaInfo, Error> {
        let url = format!("{}/meta", Self::api_base(remote));
        debug!(%url, "querying instance metadata");
        let response = self.http.get(url.clone(), accept_json()).await?;
        if !response.is_success() {
            return Err(Error::Endpoint {
                url,
                status: response.status,
                message: body_snippet(&response.body),
            });
        }
        Ok(serde_json::from_str(&response.body)?)
    }

    /// "Who am I" lookup used to backfill the account for PATs and OAuth
    /// tokens.
    pub async fn get_user_info(&self, remote: &Url, token: &str) -> Result<GitHubUserInfo, Error> {
        let url = format!("{}/user", Self::api_base(remote));
        let mut headers = accept_json();
        headers.insert("Authorization".to_string(), format!("token {}", token));
        let response = self.http.get(url.clone(), headers).await?;
        if !response.is_success() {
            return Err(Error::Endpoint {
                url,
                status: response.status,
                message: body_snippet(&response.body),
            });
        }
        Ok(serde_json::from_str(&response.body)?)
    }

    /// Mints a personal access token from a basic credential, optionally
    /// carrying a two-factor one-time code.
    pub async fn create_personal_access_token(
        &self,
        remote: &Url,
        username: &str,
        password: &str,
        otp_code: Option<&str>,
        scopes: &[&str],
    ) -> Result<CreateTokenResult, Error> {
        let url = format!("{}/authorizations", Self::api_base(remote));

        let mut headers = accept_json();
        headers.insert(
            "Authorization".to_string(),
            basic_auth_header(username, password),
        );
        if let Some(code) = otp_code {
            headers.insert("X-GitHub-OTP".to_string(), code.to_string());
        }

        let body = serde_json::json!({
            "scopes": scopes,
            "note": format!("gitvault credential for {}", remote),
            "fingerprint": uuid::Uuid::new_v4().to_string(),
        })
        .to_string();

        let response = self.http.post_json(url.clone(), body, headers).await?;

        match response.status {
            200 | 201 => {
                let parsed: CreateTokenResponse = serde_json::from_str(&response.body)?;
                match parsed.token {
                    Some(token) => Ok(CreateTokenResult::Success(token)),
                    None => Ok(CreateTokenResult::Failure(
                        "token creation response did not include a token".to_string(),
                    )),
                }
            }
            401 => {
                if let Some(otp) = response.header("X-GitHub-OTP") {
                    if otp.contains("required") {
                        return Ok(CreateTokenResult::TwoFactorRequired {
                            sms: otp.contains("sms"),
                        });
                    }
                }
                Ok(CreateTokenResult::Failure(
                    "the username or password is incorrect".to_string(),
                ))
            }
            _ => Ok(CreateTokenResult::Failure(format!(
                "HTTP {}: {}",
                response.status,
                body_snippet(&response.body)
            ))),
        }
    }
}

fn accept_json() -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert(
        "Accept".to_string(),
        "application/vnd.github.v3+json".to_string(),
    );
    headers
}

// gitvault-core/src/auth/oidc.rs

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use gitvault_common::error::Error;

use crate::http::HttpClient;

/// Endpoint URLs discovered from an authority's well-known configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OidcConfiguration {
    pub issuer: Option<String>,
    pub authorization_endpoint: Option<String>,
    pub token_endpoint: Option<String>,
    pub device_authorization_endpoint: Option<String>,
    pub userinfo_endpoint: Option<String>,
    pub registration_endpoint: Option<String>,
}

/// Fetches `<authority>/.well-known/openid-configuration`.
pub struct OidcClient {
    http: Arc<dyn HttpClient<Error = Error>>,
    authority: String,
}

impl OidcClient {
    pub fn new(http: Arc<dyn HttpClient<Error = Error>>, authority: impl Into<String>) -> Self {
        Self {
            http,
            authority: authority.into(),
        }
    }

    pub async fn get_configuration(&self) -> Result<OidcConfiguration, Error> {
        // The authority is normalized to end in exactly one slash before
        // the well-known suffix is appended.
        let mut url = self.authority.trim_end_matches('/').to_string();
        url.push('/');
        url.push_str(".well-known/openid-configuration");

        let response = self.http.get(url.clone(), HashMap::new()).await?;
        if !response.is_success() {
            return Err(Error::Endpoint {
                url,
                status: response.status,
                message: "OpenID Connect discovery request failed".to_string(),
            });
        }

        Ok(serde_json::from_str(&response.body)?)
    }
}

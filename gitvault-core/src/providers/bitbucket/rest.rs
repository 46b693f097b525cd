// gitvault-core/src/providers/bitbucket/rest.rs

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use gitvault_common::error::Error;

use crate::http::{HttpClient, body_snippet};

const API_BASE: &str = "https://api.bitbucket.org";

#[derive(Debug, Clone, Deserialize)]
pub struct BitbucketUserInfo {
    pub username: String,
}

pub struct BitbucketRestApi {
    http: Arc<dyn HttpClient<Error = Error>>,
}

impl BitbucketRestApi {
    pub fn new(http: Arc<dyn HttpClient<Error = Error>>) -> Self {
        Self { http }
    }

    /// Resolves the login of the user owning `access_token`.
    pub async fn get_user_info(&self, access_token: &str) -> Result<BitbucketUserInfo, Error> {
        let url = format!("{}/2.0/user", API_BASE);
        let mut headers = HashMap::new();
        headers.insert("Accept".to_string(), "application/json".to_string());
        headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", access_token),
        );

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
}

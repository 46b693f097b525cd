//! HTTP client abstraction layer for host REST calls.
//!
//! The trait-based design exists so that host providers, the OAuth client
//! and the registry probe can be exercised in tests without real network
//! requests. The default implementation wraps reqwest.
//!
//! Responses are materialized into [`HttpResponse`] (status + lowercased
//! headers + body) because callers here routinely inspect headers — the
//! registry probe looks for provider-identifying headers, and the Azure
//! DevOps authority lookup reads `WWW-Authenticate`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::Error;

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names lowercased; repeated headers joined with `", "`.
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|v| v.as_str())
    }
}

/// A generic trait for making HTTP requests.
#[async_trait]
pub trait HttpClient: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn get(
        &self,
        url: String,
        headers: HashMap<String, String>,
    ) -> Result<HttpResponse, Self::Error>;

    async fn head(&self, url: String) -> Result<HttpResponse, Self::Error>;

    async fn post_form(
        &self,
        url: String,
        params: Vec<(String, String)>,
        headers: HashMap<String, String>,
    ) -> Result<HttpResponse, Self::Error>;

    async fn post_json(
        &self,
        url: String,
        body: String,
        headers: HashMap<String, String>,
    ) -> Result<HttpResponse, Self::Error>;
}

#[derive(Clone)]
pub struct DefaultHttpClient {
    client: reqwest::Client,
}

const USER_AGENT: &str = concat!("gitvault/", env!("CARGO_PKG_VERSION"));

impl DefaultHttpClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    async fn materialize(response: reqwest::Response) -> Result<HttpResponse, Error> {
        let status = response.status().as_u16();
        let mut headers: HashMap<String, String> = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                let key = name.as_str().to_ascii_lowercase();
                headers
                    .entry(key)
                    .and_modify(|existing| {
                        existing.push_str(", ");
                        existing.push_str(value);
                    })
                    .or_insert_with(|| value.to_string());
            }
        }
        let body = response.text().await?;
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

impl Default for DefaultHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for DefaultHttpClient {
    type Error = Error;

    async fn get(
        &self,
        url: String,
        headers: HashMap<String, String>,
    ) -> Result<HttpResponse, Self::Error> {
        let mut request = self.client.get(&url);
        for (key, value) in headers {
            request = request.header(&key, value);
        }
        Self::materialize(request.send().await?).await
    }

    async fn head(&self, url: String) -> Result<HttpResponse, Self::Error> {
        Self::materialize(self.client.head(&url).send().await?).await
    }

    async fn post_form(
        &self,
        url: String,
        params: Vec<(String, String)>,
        headers: HashMap<String, String>,
    ) -> Result<HttpResponse, Self::Error> {
        let mut request = self.client.post(&url).form(&params);
        for (key, value) in headers {
            request = request.header(&key, value);
        }
        Self::materialize(request.send().await?).await
    }

    async fn post_json(
        &self,
        url: String,
        body: String,
        headers: HashMap<String, String>,
    ) -> Result<HttpResponse, Self::Error> {
        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .body(body);
        for (key, value) in headers {
            request = request.header(&key, value);
        }
        Self::materialize(request.send().await?).await
    }
}

/// A bounded snippet of a response body, for error messages.
pub(crate) fn body_snippet(body: &str) -> String {
    const LIMIT: usize = 256;
    if body.len() > LIMIT {
        let mut end = LIMIT;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}

/// Basic `Authorization` header value for a username/password pair.
pub fn basic_auth_header(username: &str, password: &str) -> String {
    use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
    format!(
        "Basic {}",
        BASE64.encode(format!("{}:{}", username, password))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut headers = HashMap::new();
        headers.insert("x-github-request-id".to_string(), "abc:123".to_string());
        let resp = HttpResponse {
            status: 200,
            headers,
            body: String::new(),
        };
        assert_eq!(resp.header("X-GitHub-Request-Id"), Some("abc:123"));
        assert!(resp.is_success());
    }

    #[test]
    fn basic_auth_header_encodes() {
        assert_eq!(
            basic_auth_header("aladdin", "opensesame"),
            "Basic YWxhZGRpbjpvcGVuc2VzYW1l"
        );
    }
}

// File: gitvault-common/src/models/oauth.rs

use std::time::Duration;

/// Result of one token endpoint round trip. `access_token` and
/// `token_type` are required by the protocol; everything else is optional.
#[derive(Debug, Clone)]
pub struct OAuth2TokenResult {
    pub access_token: String,
    pub token_type: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<Duration>,
    pub scopes: Option<Vec<String>>,
}

/// Result of a device-authorization endpoint round trip.
#[derive(Debug, Clone)]
pub struct OAuth2DeviceCodeResult {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    /// Server-specified poll interval; 5 seconds when the server omits it.
    pub polling_interval: Duration,
    pub expires_in: Option<Duration>,
}

/// The outcome of a completed authorization-code browser leg: the code plus
/// the PKCE verifier and redirect URI that must be echoed to the token
/// endpoint.
#[derive(Debug, Clone)]
pub struct AuthorizationCodeResult {
    pub code: String,
    pub code_verifier: String,
    pub redirect_uri: String,
}

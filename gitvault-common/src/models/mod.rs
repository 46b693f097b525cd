// gitvault-common/src/models/mod.rs

pub mod auth;
pub mod credential;
pub mod input;
pub mod oauth;

pub use auth::AuthenticationModes;
pub use credential::Credential;
pub use input::InputArguments;
pub use oauth::{AuthorizationCodeResult, OAuth2DeviceCodeResult, OAuth2TokenResult};

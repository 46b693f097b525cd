// gitvault-core/src/config.rs
//
// Environment-backed settings, snapshotted once per invocation. Tests build
// a Settings by hand instead of mutating the process environment.

use std::collections::HashMap;
use std::env;

use gitvault_common::models::auth::AuthenticationModes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Keyring,
    File,
    Memory,
}

/// Optional OAuth endpoint configuration for hosts the generic provider
/// serves, supplied entirely through the environment.
#[derive(Debug, Clone)]
pub struct GenericOAuthConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub device_authorization_endpoint: Option<String>,
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    interactive: bool,
    terminal_prompts: bool,
    desktop_session: bool,
    use_http_path: bool,
    probe_enabled: bool,
    probe_timeout_ms: u64,
    use_broker: bool,
    store_backend: StoreBackend,
    mode_overrides: HashMap<String, AuthenticationModes>,
    helper_overrides: HashMap<String, String>,
    generic_oauth: Option<GenericOAuthConfig>,
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "1" | "true" | "yes" | "on" | "always"
    )
}

fn is_falsey(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "0" | "false" | "no" | "off" | "never"
    )
}

impl Settings {
    /// Provider ids with configurable mode/helper overrides.
    pub const PROVIDER_IDS: &'static [&'static str] = &["github", "bitbucket", "azure-repos", "generic"];

    pub fn from_env() -> Self {
        let mut mode_overrides = HashMap::new();
        let mut helper_overrides = HashMap::new();
        for &id in Self::PROVIDER_IDS {
            let prefix = id.to_uppercase().replace('-', "_");
            if let Ok(value) = env::var(format!("GITVAULT_{}_AUTH_MODES", prefix)) {
                match value.parse::<AuthenticationModes>() {
                    Ok(modes) if !modes.is_none() => {
                        mode_overrides.insert(id.to_string(), modes);
                    }
                    _ => {
                        tracing::warn!(provider = id, value = %value,
                            "ignoring invalid authentication modes override");
                    }
                }
            }
            if let Ok(value) = env::var(format!("GITVAULT_{}_HELPER", prefix)) {
                helper_overrides.insert(id.to_string(), value);
            }
        }

        let interactive = env::var("GITVAULT_INTERACTIVE")
            .map(|v| !is_falsey(&v))
            .unwrap_or(true);
        let terminal_prompts = env::var("GIT_TERMINAL_PROMPT")
            .map(|v| v != "0")
            .unwrap_or(true);

        let desktop_session = if cfg!(any(target_os = "windows", target_os = "macos")) {
            true
        } else {
            env::var("DISPLAY").is_ok() || env::var("WAYLAND_DISPLAY").is_ok()
        };

        let store_backend = match env::var("GITVAULT_CREDENTIAL_STORE").as_deref() {
            Ok("file") => StoreBackend::File,
            Ok("memory") => StoreBackend::Memory,
            _ => StoreBackend::Keyring,
        };

        let generic_oauth = Self::generic_oauth_from_env();

        Self {
            interactive,
            terminal_prompts,
            desktop_session,
            use_http_path: env::var("GITVAULT_USE_HTTP_PATH")
                .map(|v| is_truthy(&v))
                .unwrap_or(false),
            probe_enabled: env::var("GITVAULT_AUTODETECT_PROBE")
                .map(|v| !is_falsey(&v))
                .unwrap_or(true),
            probe_timeout_ms: env::var("GITVAULT_AUTODETECT_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1500),
            use_broker: env::var("GITVAULT_USE_BROKER")
                .map(|v| is_truthy(&v))
                .unwrap_or(false),
            store_backend,
            mode_overrides,
            helper_overrides,
            generic_oauth,
        }
    }

    fn generic_oauth_from_env() -> Option<GenericOAuthConfig> {
        let client_id = env::var("GITVAULT_OAUTH_CLIENT_ID").ok()?;
        let authorization_endpoint = env::var("GITVAULT_OAUTH_AUTHORIZE_URL").ok()?;
        let token_endpoint = env::var("GITVAULT_OAUTH_TOKEN_URL").ok()?;
        Some(GenericOAuthConfig {
            client_id,
            client_secret: env::var("GITVAULT_OAUTH_CLIENT_SECRET").ok(),
            authorization_endpoint,
            token_endpoint,
            device_authorization_endpoint: env::var("GITVAULT_OAUTH_DEVICE_URL").ok(),
            scopes: env::var("GITVAULT_OAUTH_SCOPES")
                .map(|s| s.split([' ', ',']).filter(|p| !p.is_empty()).map(String::from).collect())
                .unwrap_or_default(),
        })
    }

    /// A permissive default for tests and embedding.
    pub fn for_testing() -> Self {
        Self {
            interactive: true,
            terminal_prompts: true,
            desktop_session: true,
            use_http_path: false,
            probe_enabled: true,
            probe_timeout_ms: 1500,
            use_broker: false,
            store_backend: StoreBackend::Memory,
            mode_overrides: HashMap::new(),
            helper_overrides: HashMap::new(),
            generic_oauth: None,
        }
    }

    pub fn is_interaction_allowed(&self) -> bool {
        self.interactive
    }

    pub fn is_terminal_prompts_enabled(&self) -> bool {
        self.terminal_prompts
    }

    pub fn is_desktop_session(&self) -> bool {
        self.desktop_session
    }

    pub fn use_http_path(&self) -> bool {
        self.use_http_path
    }

    pub fn is_probe_enabled(&self) -> bool {
        self.probe_enabled
    }

    pub fn probe_timeout_ms(&self) -> u64 {
        self.probe_timeout_ms
    }

    pub fn use_broker(&self) -> bool {
        self.use_broker
    }

    pub fn store_backend(&self) -> StoreBackend {
        self.store_backend
    }

    /// An explicit operator override always short-circuits capability
    /// resolution for the given provider.
    pub fn authentication_modes_override(&self, provider_id: &str) -> Option<AuthenticationModes> {
        self.mode_overrides.get(provider_id).copied()
    }

    /// Helper executable override for a provider. `Some("")` means the
    /// operator disabled the helper outright.
    pub fn helper_override(&self, provider_id: &str) -> Option<&str> {
        self.helper_overrides.get(provider_id).map(|v| v.as_str())
    }

    pub fn generic_oauth(&self) -> Option<&GenericOAuthConfig> {
        self.generic_oauth.as_ref()
    }

    // Builder-style knobs, used by tests and the daemonless embedding path.

    pub fn with_interactive(mut self, value: bool) -> Self {
        self.interactive = value;
        self
    }

    pub fn with_terminal_prompts(mut self, value: bool) -> Self {
        self.terminal_prompts = value;
        self
    }

    pub fn with_desktop_session(mut self, value: bool) -> Self {
        self.desktop_session = value;
        self
    }

    pub fn with_use_http_path(mut self, value: bool) -> Self {
        self.use_http_path = value;
        self
    }

    pub fn with_probe_enabled(mut self, value: bool) -> Self {
        self.probe_enabled = value;
        self
    }

    pub fn with_use_broker(mut self, value: bool) -> Self {
        self.use_broker = value;
        self
    }

    pub fn with_mode_override(mut self, provider_id: &str, modes: AuthenticationModes) -> Self {
        self.mode_overrides.insert(provider_id.to_string(), modes);
        self
    }

    pub fn with_helper_override(mut self, provider_id: &str, path: &str) -> Self {
        self.helper_overrides
            .insert(provider_id.to_string(), path.to_string());
        self
    }

    pub fn with_generic_oauth(mut self, config: GenericOAuthConfig) -> Self {
        self.generic_oauth = Some(config);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn testing_defaults_are_permissive() {
        let settings = Settings::for_testing();
        assert!(settings.is_interaction_allowed());
        assert!(settings.is_terminal_prompts_enabled());
        assert!(settings.is_desktop_session());
        assert_eq!(settings.store_backend(), StoreBackend::Memory);
    }

    #[test]
    fn mode_override_lookup() {
        let settings = Settings::for_testing()
            .with_mode_override("github", AuthenticationModes::PAT);
        assert_eq!(
            settings.authentication_modes_override("github"),
            Some(AuthenticationModes::PAT)
        );
        assert_eq!(settings.authentication_modes_override("bitbucket"), None);
    }
}

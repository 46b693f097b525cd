// gitvault-helper/src/context.rs
//
// Wires the concrete backends together for one invocation: settings from
// the environment, the credential store backend, the authority cache, and
// the host provider registry.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use keyring::Entry;
use rand::rngs::OsRng;
use rand_core::TryRngCore;
use tracing::{debug, warn};

use gitvault_common::error::Error;
use gitvault_common::traits::store_traits::CredentialStore;

use gitvault_core::auth::broker::{IdentityBroker, UnavailableBroker};
use gitvault_core::auth::helper::ProcessHelperRunner;
use gitvault_core::auth::oauth2::SystemBrowser;
use gitvault_core::auth::registry::{HostProviderPriority, HostProviderRegistry};
use gitvault_core::auth::terminal::StdTerminal;
use gitvault_core::cache::{AuthorityCache, JsonFileStore};
use gitvault_core::config::{Settings, StoreBackend};
use gitvault_core::http::DefaultHttpClient;
use gitvault_core::providers::{
    AzureReposProvider, BitbucketProvider, GenericProvider, GitHubProvider,
};
use gitvault_core::store::{FileCredentialStore, KeyringCredentialStore, MemoryCredentialStore};

const KEYRING_NAMESPACE: &str = "gitvault";
const MASTER_KEY_SERVICE: &str = "gitvault";
const MASTER_KEY_ACCOUNT: &str = "master-key";

pub struct HelperContext {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn CredentialStore>,
    pub registry: HostProviderRegistry,
    pub authority_cache: Arc<AuthorityCache>,
}

impl HelperContext {
    pub fn bootstrap() -> Result<Self, Error> {
        let settings = Arc::new(Settings::from_env());

        let data_dir = data_dir()?;
        let cache_dir = cache_dir()?;

        let store: Arc<dyn CredentialStore> = match settings.store_backend() {
            StoreBackend::Keyring => Arc::new(KeyringCredentialStore::new(
                KEYRING_NAMESPACE,
                data_dir.join("keyring-index.json"),
            )),
            StoreBackend::File => {
                let key = get_master_key(&data_dir)?;
                Arc::new(FileCredentialStore::new(
                    data_dir.join("credentials.dat"),
                    &key,
                )?)
            }
            StoreBackend::Memory => Arc::new(MemoryCredentialStore::new()),
        };

        let authority_cache = Arc::new(AuthorityCache::new(Box::new(JsonFileStore::new(
            cache_dir.join("authority-cache.json"),
        ))));

        let http = Arc::new(DefaultHttpClient::new());
        let terminal = Arc::new(StdTerminal);
        let browser = Arc::new(SystemBrowser);
        let helper_runner = Arc::new(ProcessHelperRunner);
        let broker: Arc<dyn IdentityBroker> = Arc::new(UnavailableBroker);

        let mut registry = HostProviderRegistry::new(http.clone()).with_probe(
            settings.is_probe_enabled(),
            Duration::from_millis(settings.probe_timeout_ms()),
        );

        registry.register(
            Arc::new(AzureReposProvider::new(
                http.clone(),
                store.clone(),
                settings.clone(),
                terminal.clone(),
                browser.clone(),
                broker.clone(),
                authority_cache.clone(),
            )),
            HostProviderPriority::Normal,
        );
        registry.register(
            Arc::new(BitbucketProvider::new(
                http.clone(),
                store.clone(),
                settings.clone(),
                terminal.clone(),
                browser.clone(),
                helper_runner.clone(),
            )),
            HostProviderPriority::Normal,
        );
        registry.register(
            Arc::new(GitHubProvider::new(
                http.clone(),
                store.clone(),
                settings.clone(),
                terminal.clone(),
                browser.clone(),
                helper_runner.clone(),
            )),
            HostProviderPriority::Normal,
        );
        // The generic provider must never win against a more specific one.
        registry.register(
            Arc::new(GenericProvider::new(
                http.clone(),
                store.clone(),
                settings.clone(),
                terminal.clone(),
                browser.clone(),
            )),
            HostProviderPriority::Low,
        );

        Ok(Self {
            settings,
            store,
            registry,
            authority_cache,
        })
    }
}

fn data_dir() -> Result<PathBuf, Error> {
    let base = dirs::data_dir()
        .ok_or_else(|| Error::Configuration("cannot locate a user data directory".to_string()))?;
    Ok(base.join("gitvault"))
}

fn cache_dir() -> Result<PathBuf, Error> {
    let base = dirs::cache_dir()
        .ok_or_else(|| Error::Configuration("cannot locate a user cache directory".to_string()))?;
    Ok(base.join("gitvault"))
}

/// The file store's AES key lives in the OS keyring when possible, and in
/// a mode-0600 key file next to the credential file otherwise.
fn get_master_key(data_dir: &PathBuf) -> Result<[u8; 32], Error> {
    use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

    if let Ok(entry) = Entry::new(MASTER_KEY_SERVICE, MASTER_KEY_ACCOUNT) {
        match entry.get_password() {
            Ok(encoded) => {
                let bytes = BASE64
                    .decode(&encoded)
                    .map_err(|e| Error::KeyDerivation(e.to_string()))?;
                let key: [u8; 32] = bytes.try_into().map_err(|_| {
                    Error::KeyDerivation("stored master key was not 32 bytes".to_string())
                })?;
                debug!("retrieved existing master key from keyring");
                return Ok(key);
            }
            Err(keyring::Error::NoEntry) => {
                let key = generate_key()?;
                if let Err(err) = entry.set_password(&BASE64.encode(key)) {
                    warn!("failed to store new master key in keyring: {}", err);
                } else {
                    debug!("stored new master key in keyring");
                    return Ok(key);
                }
            }
            Err(err) => {
                warn!("keyring unavailable for master key ({}); using key file", err);
            }
        }
    }

    let key_path = data_dir.join("master.key");
    match std::fs::read(&key_path) {
        Ok(bytes) => bytes
            .try_into()
            .map_err(|_| Error::KeyDerivation("master key file was not 32 bytes".to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let key = generate_key()?;
            std::fs::create_dir_all(data_dir)?;
            std::fs::write(&key_path, key)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = std::fs::set_permissions(&key_path, std::fs::Permissions::from_mode(0o600));
            }
            Ok(key)
        }
        Err(e) => Err(e.into()),
    }
}

fn generate_key() -> Result<[u8; 32], Error> {
    let mut key = [0u8; 32];
    let mut rng = OsRng;
    rng.try_fill_bytes(&mut key)
        .map_err(|e| Error::KeyDerivation(e.to_string()))?;
    Ok(key)
}

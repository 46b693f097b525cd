// gitvault-core/src/store/keyring_store.rs
//
// OS secure-storage backend (Windows Credential Manager, macOS Keychain,
// Linux Secret Service) via the `keyring` crate.
//
// The keyring crate cannot enumerate entries, so a non-secret JSON index
// (service -> accounts) lives next to the other gitvault data files. The
// index holds account names only; secrets never touch it. The index is
// reloaded before every operation because concurrent helper invocations
// may have changed it.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use keyring::Entry;
use tracing::{debug, warn};

use gitvault_common::error::Error;
use gitvault_common::models::credential::Credential;
use gitvault_common::traits::store_traits::CredentialStore;

pub struct KeyringCredentialStore {
    namespace: String,
    index_path: PathBuf,
    index: Mutex<HashMap<String, Vec<String>>>,
}

impl KeyringCredentialStore {
    pub fn new(namespace: impl Into<String>, index_path: PathBuf) -> Self {
        Self {
            namespace: namespace.into(),
            index_path,
            index: Mutex::new(HashMap::new()),
        }
    }

    fn qualified(&self, service: &str) -> String {
        format!("{}:{}", self.namespace, service)
    }

    fn load_index(&self) -> HashMap<String, Vec<String>> {
        match std::fs::read_to_string(&self.index_path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(map) => map,
                Err(err) => {
                    warn!("keyring index at {:?} is malformed ({}); starting empty", self.index_path, err);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        }
    }

    fn save_index(&self, index: &HashMap<String, Vec<String>>) -> Result<(), Error> {
        if let Some(parent) = self.index_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(index)?;
        let parent = self
            .index_path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(&self.index_path)
            .map_err(|e| Error::Store(format!("failed to persist keyring index: {}", e)))?;
        Ok(())
    }

    fn read_secret(&self, service: &str, account: &str) -> Result<Option<String>, Error> {
        let entry = Entry::new(&self.qualified(service), account)?;
        match entry.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn get(&self, service: &str, account: Option<&str>) -> Result<Option<Credential>, Error> {
        if let Some(account) = account {
            return Ok(self
                .read_secret(service, account)?
                .map(|secret| Credential::new(account, secret)));
        }

        let mut index = self.index.lock().expect("keyring index lock poisoned");
        *index = self.load_index();
        let Some(accounts) = index.get(service) else {
            return Ok(None);
        };
        for account in accounts {
            if let Some(secret) = self.read_secret(service, account)? {
                return Ok(Some(Credential::new(account.clone(), secret)));
            }
        }
        Ok(None)
    }

    fn add_or_update(&self, service: &str, account: &str, secret: &str) -> Result<(), Error> {
        let entry = Entry::new(&self.qualified(service), account)?;
        entry.set_password(secret)?;
        debug!(service, account, "stored credential in system keyring");

        let mut index = self.index.lock().expect("keyring index lock poisoned");
        *index = self.load_index();
        let accounts = index.entry(service.to_string()).or_default();
        if !accounts.iter().any(|a| a == account) {
            accounts.push(account.to_string());
        }
        self.save_index(&index)
    }

    fn remove(&self, service: &str, account: Option<&str>) -> Result<bool, Error> {
        let mut index = self.index.lock().expect("keyring index lock poisoned");
        *index = self.load_index();

        let accounts: Vec<String> = match account {
            Some(account) => vec![account.to_string()],
            None => index.get(service).cloned().unwrap_or_default(),
        };

        let mut removed = false;
        for account in &accounts {
            let entry = Entry::new(&self.qualified(service), account)?;
            match entry.delete_credential() {
                Ok(()) => removed = true,
                Err(keyring::Error::NoEntry) => {}
                Err(err) => return Err(err.into()),
            }
        }

        if let Some(list) = index.get_mut(service) {
            list.retain(|a| !accounts.iter().any(|r| r == a));
            if list.is_empty() {
                index.remove(service);
            }
            self.save_index(&index)?;
        }

        Ok(removed)
    }
}

// gitvault-core/src/store/file_store.rs
//
// Encrypted flat-file fallback backend for systems without a usable
// keyring service. Secrets are sealed with AES-256-GCM (see crypto.rs);
// the file is replaced wholesale on every write (temp file + rename) and
// reloaded before every operation, since concurrent helper invocations
// share it with no locking (last writer wins).

use std::io::Write;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use gitvault_common::error::Error;
use gitvault_common::models::credential::Credential;
use gitvault_common::traits::store_traits::CredentialStore;

use crate::crypto::Encryptor;

#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
    service: String,
    account: String,
    /// base64(nonce || ciphertext) of the secret.
    secret: String,
}

pub struct FileCredentialStore {
    path: PathBuf,
    encryptor: Encryptor,
}

impl FileCredentialStore {
    pub fn new(path: PathBuf, key: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            path,
            encryptor: Encryptor::new(key)?,
        })
    }

    fn load(&self) -> Result<Vec<FileEntry>, Error> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| {
                // A corrupt credential file is not silently discarded: losing
                // stored secrets without telling anyone is worse than failing.
                Error::Store(format!(
                    "credential file {:?} is malformed: {}",
                    self.path, e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, entries: &[FileEntry]) -> Result<(), Error> {
        let parent = self
            .path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&parent)?;

        let json = serde_json::to_string_pretty(entries)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
        tmp.write_all(json.as_bytes())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o600));
        }
        tmp.persist(&self.path)
            .map_err(|e| Error::Store(format!("failed to persist credential file: {}", e)))?;
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, service: &str, account: Option<&str>) -> Result<Option<Credential>, Error> {
        let entries = self.load()?;
        for entry in &entries {
            if entry.service != service {
                continue;
            }
            if account.is_none_or(|a| a == entry.account) {
                let secret = self.encryptor.decrypt(&entry.secret)?;
                return Ok(Some(Credential::new(entry.account.clone(), secret)));
            }
        }
        Ok(None)
    }

    fn add_or_update(&self, service: &str, account: &str, secret: &str) -> Result<(), Error> {
        let mut entries = self.load()?;
        let sealed = self.encryptor.encrypt(secret)?;
        match entries
            .iter_mut()
            .find(|e| e.service == service && e.account == account)
        {
            Some(entry) => entry.secret = sealed,
            None => entries.push(FileEntry {
                service: service.to_string(),
                account: account.to_string(),
                secret: sealed,
            }),
        }
        self.save(&entries)?;
        debug!(service, account, "stored credential in file store");
        Ok(())
    }

    fn remove(&self, service: &str, account: Option<&str>) -> Result<bool, Error> {
        let mut entries = self.load()?;
        let before = entries.len();
        entries.retain(|e| {
            e.service != service || account.is_some_and(|a| a != e.account)
        });
        let removed = entries.len() != before;
        if removed {
            self.save(&entries)?;
        }
        Ok(removed)
    }
}

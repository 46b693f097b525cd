// gitvault-core/src/store/memory.rs

use dashmap::DashMap;

use gitvault_common::error::Error;
use gitvault_common::models::credential::Credential;
use gitvault_common::traits::store_traits::CredentialStore;

/// In-process credential storage. Nothing survives the invocation, which
/// makes it the right backend for tests and for operators who explicitly
/// opt out of persistence.
#[derive(Default)]
pub struct MemoryCredentialStore {
    credentials: DashMap<(String, String), String>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, service: &str, account: Option<&str>) -> Result<Option<Credential>, Error> {
        if let Some(account) = account {
            let key = (service.to_string(), account.to_string());
            return Ok(self
                .credentials
                .get(&key)
                .map(|secret| Credential::new(account, secret.value().clone())));
        }

        // No account requested: any credential for the service will do.
        for entry in self.credentials.iter() {
            let (svc, acct) = entry.key();
            if svc == service {
                return Ok(Some(Credential::new(acct.clone(), entry.value().clone())));
            }
        }
        Ok(None)
    }

    fn add_or_update(&self, service: &str, account: &str, secret: &str) -> Result<(), Error> {
        self.credentials.insert(
            (service.to_string(), account.to_string()),
            secret.to_string(),
        );
        Ok(())
    }

    fn remove(&self, service: &str, account: Option<&str>) -> Result<bool, Error> {
        match account {
            Some(account) => {
                let key = (service.to_string(), account.to_string());
                Ok(self.credentials.remove(&key).is_some())
            }
            None => {
                let keys: Vec<_> = self
                    .credentials
                    .iter()
                    .filter(|e| e.key().0 == service)
                    .map(|e| e.key().clone())
                    .collect();
                let mut removed = false;
                for key in keys {
                    removed |= self.credentials.remove(&key).is_some();
                }
                Ok(removed)
            }
        }
    }
}

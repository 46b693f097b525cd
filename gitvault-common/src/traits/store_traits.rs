// File: gitvault-common/src/traits/store_traits.rs

use crate::error::Error;
use crate::models::credential::Credential;

/// Durable service/account/secret storage.
///
/// Keys are namespaced by `service` (the normalized base URL of the host,
/// trailing slash trimmed) and `account`. An `account` of `None` means
/// "any/default account for this service".
///
/// The helper is re-invoked fresh by Git for every operation, so no
/// implementation may assume exclusivity across calls: every read goes to
/// the backend, and writes replace whole values. A `get` racing an `erase`
/// from another process instance resolves to whatever the backend's native
/// atomicity gives us (last writer wins).
pub trait CredentialStore: Send + Sync {
    fn get(&self, service: &str, account: Option<&str>) -> Result<Option<Credential>, Error>;

    /// Create or overwrite the entry for `(service, account)`. Storing
    /// twice leaves exactly one entry holding the latest secret.
    fn add_or_update(&self, service: &str, account: &str, secret: &str) -> Result<(), Error>;

    /// Remove the entry (or, with `None`, all entries) for `service`.
    /// Returns whether anything was removed.
    fn remove(&self, service: &str, account: Option<&str>) -> Result<bool, Error>;
}

// File: gitvault-common/src/models/credential.rs

use std::collections::HashMap;
use std::fmt;

/// A username/secret pair produced by a host provider, plus an open-ended
/// set of extra string properties (credential type tag, request id, ...)
/// that are echoed back to Git on `get`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub account: String,
    pub secret: String,
    pub properties: HashMap<String, String>,
}

impl Credential {
    pub fn new(account: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            secret: secret.into(),
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

// The secret must never end up in trace output.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("account", &self.account)
            .field("secret", &"********")
            .field("properties", &self.properties)
            .finish()
    }
}

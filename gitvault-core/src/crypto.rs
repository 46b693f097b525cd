use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use rand::rngs::OsRng;
use rand_core::TryRngCore;
use std::sync::Arc;

use crate::Error;

#[derive(Clone)]
pub struct Encryptor {
    cipher: Arc<Aes256Gcm>,
}

impl Encryptor {
    /// Creates a new `Encryptor` using a 32‐byte key for AES‐256.
    pub fn new(key_bytes: &[u8]) -> Result<Self, Error> {
        // AES-256-GCM requires a 256-bit (32 bytes) key.
        if key_bytes.len() != 32 {
            return Err(Error::KeyDerivation(format!(
                "AES-256 key must be 32 bytes, got {}",
                key_bytes.len()
            )));
        }
        let key = Key::<Aes256Gcm>::clone_from_slice(key_bytes);
        let cipher = Aes256Gcm::new(&key);

        Ok(Self {
            cipher: Arc::new(cipher),
        })
    }

    /// Encrypts `data` into base64(`nonce || ciphertext`).
    ///
    /// A random 12‐byte nonce is generated each time (for AES-GCM).
    pub fn encrypt(&self, data: &str) -> Result<String, Error> {
        let mut nonce_bytes = [0u8; 12];
        let mut rng = OsRng;
        rng.try_fill_bytes(&mut nonce_bytes)
            .map_err(|e| Error::Encryption(e.to_string()))?;

        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(nonce, data.as_bytes())
            .map_err(|e| Error::Encryption(e.to_string()))?;

        let mut combined = Vec::with_capacity(nonce_bytes.len() + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(combined))
    }

    /// Decrypts base64(`nonce || ciphertext`) back into the original string.
    pub fn decrypt(&self, encoded: &str) -> Result<String, Error> {
        let combined = BASE64
            .decode(encoded)
            .map_err(|e| Error::Decryption(e.to_string()))?;

        if combined.len() < 12 {
            return Err(Error::Decryption(
                "ciphertext too short to contain a nonce".to_string(),
            ));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| Error::Decryption(e.to_string()))?;

        String::from_utf8(plaintext).map_err(|e| Error::Decryption(e.to_string()))
    }
}

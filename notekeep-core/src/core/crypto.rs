//! Encryption of locked note bodies.
//!
//! Locked notes are encrypted on the way into the database and decrypted on
//! the way out. The cipher is pluggable through [`NoteCipher`]; the default
//! [`XChaChaCipher`] derives one key from the user's passphrase with Argon2id
//! and seals each body with XChaCha20-Poly1305 under a fresh nonce.

use crate::{Result, StoreError};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::aead::Aead;
use chacha20poly1305::{Key, KeyInit, XChaCha20Poly1305, XNonce};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use zeroize::Zeroizing;

const ENVELOPE_PREFIX: &str = "xc1$";
/// Length of the key derivation salt.
pub const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 24;
const KEY_LEN: usize = 32;

/// Passphrase-keyed symmetric encryption of note content.
pub trait NoteCipher: Send + Sync {
    fn encrypt(&self, plaintext: &str, passphrase: &str) -> Result<String>;
    fn decrypt(&self, ciphertext: &str, passphrase: &str) -> Result<String>;
}

/// Argon2id cost parameters for passphrase key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

type CacheKey = ([u8; 32], [u8; SALT_LEN]);

/// XChaCha20-Poly1305 with an Argon2id passphrase key.
///
/// Envelope: `xc1$` followed by base64 of `salt || nonce || ciphertext`.
/// A cipher instance writes every body with the same salt, so all locked
/// notes share one passphrase-derived key. The store persists that salt per
/// database. Bodies written under another salt still decrypt, since each
/// envelope carries its own. Derived keys are cached per passphrase digest
/// and salt.
pub struct XChaChaCipher {
    params: KdfParams,
    salt: [u8; SALT_LEN],
    keys: Mutex<HashMap<CacheKey, Zeroizing<[u8; KEY_LEN]>>>,
}

impl XChaChaCipher {
    pub fn new() -> Self {
        Self::with_params(KdfParams::default())
    }

    /// A cipher with a fresh random salt, for callers that do not persist one.
    pub fn with_params(params: KdfParams) -> Self {
        Self::with_salt(params, generate_salt())
    }

    pub fn with_salt(params: KdfParams, salt: [u8; SALT_LEN]) -> Self {
        Self {
            params,
            salt,
            keys: Mutex::new(HashMap::new()),
        }
    }

    /// The salt new envelopes are written with.
    pub fn salt(&self) -> [u8; SALT_LEN] {
        self.salt
    }

    fn key_for(&self, passphrase: &str, salt: &[u8; SALT_LEN]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
        let digest: [u8; 32] = Sha256::digest(passphrase.as_bytes()).into();
        let cache_key = (digest, *salt);

        let mut keys = self.keys.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(key) = keys.get(&cache_key) {
            return Ok(key.clone());
        }

        let params = Params::new(
            self.params.memory_kib,
            self.params.iterations,
            self.params.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| StoreError::Encryption(format!("invalid key derivation parameters: {e}")))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        argon2
            .hash_password_into(passphrase.as_bytes(), salt, &mut key[..])
            .map_err(|e| StoreError::Encryption(format!("key derivation failed: {e}")))?;
        keys.insert(cache_key, key.clone());
        Ok(key)
    }
}

impl Default for XChaChaCipher {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteCipher for XChaChaCipher {
    fn encrypt(&self, plaintext: &str, passphrase: &str) -> Result<String> {
        let key = self.key_for(passphrase, &self.salt)?;
        let cipher = XChaCha20Poly1305::new(Key::from_slice(&key[..]));

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let sealed = cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|e| StoreError::Encryption(e.to_string()))?;

        let mut envelope = Vec::with_capacity(SALT_LEN + NONCE_LEN + sealed.len());
        envelope.extend_from_slice(&self.salt);
        envelope.extend_from_slice(&nonce);
        envelope.extend_from_slice(&sealed);
        Ok(format!("{ENVELOPE_PREFIX}{}", STANDARD.encode(envelope)))
    }

    fn decrypt(&self, ciphertext: &str, passphrase: &str) -> Result<String> {
        let encoded = ciphertext
            .strip_prefix(ENVELOPE_PREFIX)
            .ok_or_else(|| StoreError::Decryption("unrecognised ciphertext format".to_string()))?;
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| StoreError::Decryption(e.to_string()))?;
        if bytes.len() < SALT_LEN + NONCE_LEN {
            return Err(StoreError::Decryption("ciphertext truncated".to_string()));
        }

        let (salt, rest) = bytes.split_at(SALT_LEN);
        let (nonce, sealed) = rest.split_at(NONCE_LEN);
        let mut salt_bytes = [0u8; SALT_LEN];
        salt_bytes.copy_from_slice(salt);

        let key = self.key_for(passphrase, &salt_bytes)?;
        let cipher = XChaCha20Poly1305::new(Key::from_slice(&key[..]));
        let plain = cipher
            .decrypt(XNonce::from_slice(nonce), sealed)
            .map_err(|e| StoreError::Decryption(e.to_string()))?;
        String::from_utf8(plain).map_err(|e| StoreError::Decryption(e.to_string()))
    }
}

/// A random salt for a new database.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Salt stored in an envelope, or `None` if it is not one.
pub fn envelope_salt(ciphertext: &str) -> Option<[u8; SALT_LEN]> {
    let bytes = STANDARD.decode(ciphertext.strip_prefix(ENVELOPE_PREFIX)?).ok()?;
    bytes.get(..SALT_LEN)?.try_into().ok()
}

/// Write path: the value to persist in the `content` column.
pub fn seal_content(
    cipher: &dyn NoteCipher,
    content: &str,
    locked: bool,
    passphrase: &str,
) -> Result<String> {
    if locked {
        cipher.encrypt(content, passphrase)
    } else {
        Ok(content.to_string())
    }
}

/// Read path: the plaintext for a stored `content` value.
pub fn open_content(
    cipher: &dyn NoteCipher,
    stored: &str,
    locked: bool,
    passphrase: &str,
) -> Result<String> {
    if locked {
        cipher.decrypt(stored, passphrase)
    } else {
        Ok(stored.to_string())
    }
}

#[cfg(test)]
pub(crate) const TEST_KDF: KdfParams = KdfParams {
    memory_kib: 64,
    iterations: 1,
    parallelism: 1,
};

#[cfg(test)]
pub(crate) fn test_cipher() -> XChaChaCipher {
    XChaChaCipher::with_params(TEST_KDF)
}

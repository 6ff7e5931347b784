//! Authenticated encryption with associated data.
//!
//! AES-256-GCM behind typed `Key`/`Nonce` wrappers. Decryption failure
//! (wrong key, tampered ciphertext, wrong associated data) is a recoverable
//! condition reported as `None`: callers routinely probe ciphertexts that
//! were never meant for them.
//!
//! Nonce uniqueness per key is the caller's responsibility.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::Aes256Gcm;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Key size in bytes (AES-256).
pub const KEY_SIZE: usize = 32;

/// Nonce size in bytes (96-bit GCM nonce).
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size in bytes appended to every ciphertext.
pub const TAG_SIZE: usize = 16;

/// A 256-bit AEAD key, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Key([u8; KEY_SIZE]);

impl Key {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl From<[u8; KEY_SIZE]> for Key {
    fn from(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }
}

/// A 96-bit nonce.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

impl From<[u8; NONCE_SIZE]> for Nonce {
    fn from(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }
}

/// Encrypts `plaintext` under `key`/`nonce`, authenticating `associated_data`.
///
/// Returns `ciphertext || tag`.
#[must_use]
pub fn encrypt(key: &Key, nonce: &Nonce, plaintext: &[u8], associated_data: &[u8]) -> Vec<u8> {
    let cipher = Aes256Gcm::new((&key.0).into());
    cipher
        .encrypt(
            (&nonce.0).into(),
            Payload {
                msg: plaintext,
                aad: associated_data,
            },
        )
        .expect("AES-GCM encryption is infallible for in-memory buffers")
}

/// Decrypts and authenticates `ciphertext || tag`.
///
/// Returns `None` if authentication fails for any reason.
#[must_use]
pub fn decrypt(
    key: &Key,
    nonce: &Nonce,
    ciphertext: &[u8],
    associated_data: &[u8],
) -> Option<Vec<u8>> {
    let cipher = Aes256Gcm::new((&key.0).into());
    cipher
        .decrypt(
            (&nonce.0).into(),
            Payload {
                msg: ciphertext,
                aad: associated_data,
            },
        )
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> Key {
        Key::from([7u8; KEY_SIZE])
    }

    fn test_nonce() -> Nonce {
        Nonce::from([3u8; NONCE_SIZE])
    }

    #[test]
    fn test_roundtrip() {
        let ct = encrypt(&test_key(), &test_nonce(), b"hello", b"ad");
        let pt = decrypt(&test_key(), &test_nonce(), &ct, b"ad").expect("decrypt failed");
        assert_eq!(pt, b"hello");
    }

    #[test]
    fn test_ciphertext_length() {
        let ct = encrypt(&test_key(), &test_nonce(), b"hello", b"");
        assert_eq!(ct.len(), 5 + TAG_SIZE);
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let mut ct = encrypt(&test_key(), &test_nonce(), b"hello", b"");
        ct[0] ^= 1;
        assert!(decrypt(&test_key(), &test_nonce(), &ct, b"").is_none());
    }

    #[test]
    fn test_tampered_tag_rejected() {
        let mut ct = encrypt(&test_key(), &test_nonce(), b"hello", b"");
        let last = ct.len() - 1;
        ct[last] ^= 1;
        assert!(decrypt(&test_key(), &test_nonce(), &ct, b"").is_none());
    }

    #[test]
    fn test_wrong_key_rejected() {
        let ct = encrypt(&test_key(), &test_nonce(), b"hello", b"");
        let other = Key::from([8u8; KEY_SIZE]);
        assert!(decrypt(&other, &test_nonce(), &ct, b"").is_none());
    }

    #[test]
    fn test_wrong_associated_data_rejected() {
        let ct = encrypt(&test_key(), &test_nonce(), b"hello", b"ad-1");
        assert!(decrypt(&test_key(), &test_nonce(), &ct, b"ad-2").is_none());
    }

    #[test]
    fn test_empty_plaintext() {
        let ct = encrypt(&test_key(), &test_nonce(), b"", b"ad");
        let pt = decrypt(&test_key(), &test_nonce(), &ct, b"ad").expect("decrypt failed");
        assert!(pt.is_empty());
    }
}

//! User identity derivation and announcement authentication.
//!
//! An identity is a pair of post-quantum keypairs — ML-KEM-768 for sealing
//! material to a user, ML-DSA-65 for proving authorship — expanded
//! deterministically from a caller-supplied root seed. The same seed always
//! reproduces the same identity, which is what makes seed-phrase account
//! restore possible. The seed itself (mnemonic handling, wallet derivation)
//! is provided by the caller; this crate only consumes its entropy.
//!
//! A [`UserId`] is a 32-byte one-way digest of the public keys, used as the
//! addressing key everywhere inside the engine. At display/storage
//! boundaries it is encoded with Base58Check; internally only the raw bytes
//! circulate.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

mod auth_blob;

pub use auth_blob::AuthBlob;

/// Minimum acceptable seed length in bytes (128 bits of entropy).
pub const MIN_SEED_LEN: usize = 16;

/// Length of a derived user identifier.
pub const USER_ID_SIZE: usize = 32;

const ROOT_SEED_SALT: &[u8] = b"auth.root.seed.kdf.salt---------";
const USER_ID_SALT: &[u8] = b"auth.user.id.kdf.salt-----------";

/// Errors surfaced by identity derivation and boundary decoding.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The provided seed carries too little entropy to key an identity.
    #[error("seed must be at least {MIN_SEED_LEN} bytes, got {0}")]
    InvalidSeed(usize),
    /// A Base58Check string failed checksum or length validation.
    #[error("invalid user id encoding")]
    InvalidUserIdEncoding,
}

/// Condensed root keying material for one identity.
///
/// Produced from raw seed bytes plus a domain-separation tag, so the same
/// mnemonic can key independent identities for unrelated applications.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct RootSeed([u8; 32]);

impl RootSeed {
    /// Condenses caller-supplied entropy into a root seed.
    ///
    /// Fails fast with [`AuthError::InvalidSeed`] if `seed` is shorter than
    /// [`MIN_SEED_LEN`]; a weak seed must never reach key generation.
    pub fn from_entropy(seed: &[u8], domain_tag: &[u8]) -> Result<Self, AuthError> {
        if seed.len() < MIN_SEED_LEN {
            return Err(AuthError::InvalidSeed(seed.len()));
        }
        let mut kdf = crypto_kdf::Extract::new(ROOT_SEED_SALT);
        kdf.input_item(seed);
        kdf.input_item(domain_tag);
        let expander = kdf.finalize();
        let mut root = [0u8; 32];
        expander.expand(b"auth.root.seed", &mut root);
        Ok(Self(root))
    }
}

/// A user's public key material.
#[derive(Clone, Debug, Serialize, Deserialize, Zeroize)]
pub struct UserPublicKeys {
    /// ML-KEM-768 encapsulation key; announcements are sealed to it.
    pub kem_public_key: crypto_kem::PublicKey,
    /// ML-DSA-65 verification key; announcements are verified against it.
    pub dsa_verification_key: crypto_dsa::VerificationKey,
}

impl UserPublicKeys {
    /// Derives the stable 32-byte user identifier from the public keys.
    #[must_use]
    pub fn derive_id(&self) -> UserId {
        let mut kdf = crypto_kdf::Extract::new(USER_ID_SALT);
        kdf.input_item(self.kem_public_key.as_bytes());
        kdf.input_item(self.dsa_verification_key.as_bytes());
        let expander = kdf.finalize();
        let mut id = [0u8; USER_ID_SIZE];
        expander.expand(b"auth.user.id", &mut id);
        UserId(id)
    }

    /// Serializes the public keys for transmission.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .expect("public key serialization cannot fail")
    }

    /// Deserializes public keys previously produced by [`to_bytes`](Self::to_bytes).
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .ok()
            .map(|(keys, _)| keys)
    }
}

/// A user's secret key material, zeroized on drop.
///
/// Secret keys exist in memory only while an identity is loaded; persistence
/// is the caller's job and must always be encrypted.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct UserSecretKeys {
    /// ML-KEM-768 decapsulation key.
    pub kem_secret_key: crypto_kem::SecretKey,
    /// ML-DSA-65 signing key.
    pub dsa_signing_key: crypto_dsa::SigningKey,
}

/// A loaded identity: public keys plus the matching secret keys.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Identity {
    pub public_keys: UserPublicKeys,
    pub secret_keys: UserSecretKeys,
}

impl Identity {
    /// Derives a full identity from a root seed. Deterministic.
    #[must_use]
    pub fn from_root_seed(root_seed: &RootSeed) -> Self {
        let (public_keys, secret_keys) = derive_keys_from_root_seed(root_seed);
        Self {
            public_keys,
            secret_keys,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.public_keys.derive_id()
    }
}

/// Deterministically expands a root seed into the identity keypairs.
///
/// The same root seed always yields byte-identical keys.
#[must_use]
pub fn derive_keys_from_root_seed(root_seed: &RootSeed) -> (UserPublicKeys, UserSecretKeys) {
    let mut kdf = crypto_kdf::Extract::new(ROOT_SEED_SALT);
    kdf.input_item(&root_seed.0);
    let expander = kdf.finalize();

    let mut kem_randomness = [0u8; crypto_kem::KEY_GENERATION_RANDOMNESS_SIZE];
    expander.expand(b"auth.kem.keygen", &mut kem_randomness);
    let (kem_secret_key, kem_public_key) = crypto_kem::generate_key_pair(kem_randomness);
    kem_randomness.zeroize();

    let mut dsa_randomness = [0u8; crypto_dsa::KEY_GENERATION_RANDOMNESS_SIZE];
    expander.expand(b"auth.dsa.keygen", &mut dsa_randomness);
    let (dsa_signing_key, dsa_verification_key) = crypto_dsa::generate_key_pair(dsa_randomness);
    dsa_randomness.zeroize();

    (
        UserPublicKeys {
            kem_public_key,
            dsa_verification_key,
        },
        UserSecretKeys {
            kem_secret_key,
            dsa_signing_key,
        },
    )
}

/// Stable 32-byte user identifier derived from public keys.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Zeroize)]
pub struct UserId([u8; USER_ID_SIZE]);

impl UserId {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; USER_ID_SIZE] {
        &self.0
    }

    /// Parses a raw 32-byte identifier.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let id: [u8; USER_ID_SIZE] = bytes.try_into().ok()?;
        Some(Self(id))
    }

    /// Encodes the identifier for display and external storage.
    #[must_use]
    pub fn to_base58check(&self) -> String {
        bs58::encode(&self.0).with_check().into_string()
    }

    /// Decodes a Base58Check identifier produced by
    /// [`to_base58check`](Self::to_base58check).
    pub fn from_base58check(encoded: &str) -> Result<Self, AuthError> {
        let bytes = bs58::decode(encoded)
            .with_check(None)
            .into_vec()
            .map_err(|_| AuthError::InvalidUserIdEncoding)?;
        Self::from_bytes(&bytes).ok_or(AuthError::InvalidUserIdEncoding)
    }
}

impl From<[u8; USER_ID_SIZE]> for UserId {
    fn from(bytes: [u8; USER_ID_SIZE]) -> Self {
        Self(bytes)
    }
}

impl core::fmt::Display for UserId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.to_base58check())
    }
}

impl core::fmt::Debug for UserId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "UserId({})", self.to_base58check())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_deterministic() {
        let seed = RootSeed::from_entropy(b"alice-seed-with-enough-entropy", b"tag").unwrap();
        let (pk1, sk1) = derive_keys_from_root_seed(&seed);
        let (pk2, sk2) = derive_keys_from_root_seed(&seed);
        assert_eq!(pk1.kem_public_key.as_bytes(), pk2.kem_public_key.as_bytes());
        assert_eq!(
            pk1.dsa_verification_key.as_bytes(),
            pk2.dsa_verification_key.as_bytes()
        );
        assert_eq!(sk1.kem_secret_key.as_bytes(), sk2.kem_secret_key.as_bytes());
        assert_eq!(pk1.derive_id(), pk2.derive_id());
    }

    #[test]
    fn test_different_seeds_different_identities() {
        let a = RootSeed::from_entropy(b"alice-seed-with-enough-entropy", b"tag").unwrap();
        let b = RootSeed::from_entropy(b"bob-seed-with-enough-entropy!!", b"tag").unwrap();
        let (pk_a, _) = derive_keys_from_root_seed(&a);
        let (pk_b, _) = derive_keys_from_root_seed(&b);
        assert_ne!(pk_a.derive_id(), pk_b.derive_id());
    }

    #[test]
    fn test_domain_tag_separates_identities() {
        let a = RootSeed::from_entropy(b"the-same-seed-material-here!", b"app-one").unwrap();
        let b = RootSeed::from_entropy(b"the-same-seed-material-here!", b"app-two").unwrap();
        let (pk_a, _) = derive_keys_from_root_seed(&a);
        let (pk_b, _) = derive_keys_from_root_seed(&b);
        assert_ne!(pk_a.derive_id(), pk_b.derive_id());
    }

    #[test]
    fn test_short_seed_rejected() {
        let result = RootSeed::from_entropy(b"too-short", b"tag");
        assert!(matches!(result, Err(AuthError::InvalidSeed(9))));
    }

    #[test]
    fn test_user_id_base58check_roundtrip() {
        let seed = RootSeed::from_entropy(b"alice-seed-with-enough-entropy", b"tag").unwrap();
        let (pk, _) = derive_keys_from_root_seed(&seed);
        let id = pk.derive_id();
        let encoded = id.to_base58check();
        let decoded = UserId::from_base58check(&encoded).unwrap();
        assert_eq!(id, decoded);
    }

    #[test]
    fn test_user_id_base58check_checksum_rejected() {
        let seed = RootSeed::from_entropy(b"alice-seed-with-enough-entropy", b"tag").unwrap();
        let (pk, _) = derive_keys_from_root_seed(&seed);
        let mut encoded = pk.derive_id().to_base58check();
        // flip the trailing character to break the checksum
        let tail = if encoded.ends_with('2') { '3' } else { '2' };
        encoded.pop();
        encoded.push(tail);
        assert!(UserId::from_base58check(&encoded).is_err());
    }

    #[test]
    fn test_public_keys_bytes_roundtrip() {
        let seed = RootSeed::from_entropy(b"alice-seed-with-enough-entropy", b"tag").unwrap();
        let (pk, _) = derive_keys_from_root_seed(&seed);
        let bytes = pk.to_bytes();
        let restored = UserPublicKeys::from_bytes(&bytes).unwrap();
        assert_eq!(pk.derive_id(), restored.derive_id());
    }

    #[test]
    fn test_public_keys_from_garbage_fails() {
        assert!(UserPublicKeys::from_bytes(b"garbage").is_none());
    }
}

//! Signed payload container for announcements.
//!
//! An [`AuthBlob`] carries the author's public keys, an arbitrary payload,
//! and an ML-DSA signature over both plus a caller-supplied binding key.
//! The binding key ties the signature to one specific sealed envelope (it is
//! derived from that envelope's KEM shared secret), so a blob lifted out of
//! one announcement cannot be replayed inside another.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{UserPublicKeys, UserSecretKeys};

const SIGNED_DIGEST_SALT: &[u8] = b"auth.blob.signed.digest.salt----";

/// A payload signed by its author and bound to one envelope.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct AuthBlob {
    public_keys: UserPublicKeys,
    payload: Vec<u8>,
    signature: crypto_dsa::Signature,
}

impl AuthBlob {
    /// Signs `payload` with the author's keys, binding it to `binding_key`.
    #[must_use]
    pub fn new(
        public_keys: UserPublicKeys,
        secret_keys: &UserSecretKeys,
        payload: Vec<u8>,
        binding_key: &[u8; 32],
    ) -> Self {
        let digest = Self::signed_digest(&public_keys, &payload, binding_key);
        let mut signing_randomness = [0u8; crypto_dsa::SIGNING_RANDOMNESS_SIZE];
        crypto_rng::fill_buffer(&mut signing_randomness);
        let signature = crypto_dsa::sign(&secret_keys.dsa_signing_key, &digest, signing_randomness)
            .expect("ML-DSA signing with empty context cannot fail");
        Self {
            public_keys,
            payload,
            signature,
        }
    }

    /// Verifies the signature against the embedded public keys and the
    /// binding key of the envelope this blob arrived in.
    #[must_use]
    pub fn verify(&self, binding_key: &[u8; 32]) -> bool {
        let digest = Self::signed_digest(&self.public_keys, &self.payload, binding_key);
        crypto_dsa::verify(
            &self.public_keys.dsa_verification_key,
            &digest,
            &self.signature,
        )
    }

    /// The author's public keys as claimed (and signed) by the blob.
    #[must_use]
    pub fn public_keys(&self) -> &UserPublicKeys {
        &self.public_keys
    }

    /// The signed payload.
    #[must_use]
    pub fn public_payload(&self) -> &[u8] {
        &self.payload
    }

    fn signed_digest(
        public_keys: &UserPublicKeys,
        payload: &[u8],
        binding_key: &[u8; 32],
    ) -> [u8; 32] {
        let mut kdf = crypto_kdf::Extract::new(SIGNED_DIGEST_SALT);
        kdf.input_item(binding_key);
        kdf.input_item(public_keys.kem_public_key.as_bytes());
        kdf.input_item(public_keys.dsa_verification_key.as_bytes());
        kdf.input_item(payload);
        let expander = kdf.finalize();
        let mut digest = [0u8; 32];
        expander.expand(b"auth.blob.digest", &mut digest);
        digest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{derive_keys_from_root_seed, RootSeed};

    fn test_identity(seed: &[u8]) -> (UserPublicKeys, UserSecretKeys) {
        let root = RootSeed::from_entropy(seed, b"auth-blob-test").unwrap();
        derive_keys_from_root_seed(&root)
    }

    #[test]
    fn test_blob_verifies_with_correct_binding_key() {
        let (pk, sk) = test_identity(b"alice-seed-with-enough-entropy");
        let binding_key = [42u8; 32];
        let blob = AuthBlob::new(pk, &sk, b"payload".to_vec(), &binding_key);
        assert!(blob.verify(&binding_key));
        assert_eq!(blob.public_payload(), b"payload");
    }

    #[test]
    fn test_blob_rejects_wrong_binding_key() {
        let (pk, sk) = test_identity(b"alice-seed-with-enough-entropy");
        let blob = AuthBlob::new(pk, &sk, b"payload".to_vec(), &[42u8; 32]);
        assert!(!blob.verify(&[43u8; 32]));
    }

    #[test]
    fn test_blob_rejects_tampered_payload() {
        let (pk, sk) = test_identity(b"alice-seed-with-enough-entropy");
        let binding_key = [42u8; 32];
        let mut blob = AuthBlob::new(pk, &sk, b"payload".to_vec(), &binding_key);
        blob.payload = b"tampered".to_vec();
        assert!(!blob.verify(&binding_key));
    }

    #[test]
    fn test_blob_rejects_substituted_keys() {
        let (alice_pk, alice_sk) = test_identity(b"alice-seed-with-enough-entropy");
        let (mallory_pk, _) = test_identity(b"mallory-seed-with-enough-ent!");
        let binding_key = [42u8; 32];
        let mut blob = AuthBlob::new(alice_pk, &alice_sk, b"payload".to_vec(), &binding_key);
        // an attacker swapping in their own keys invalidates the signature
        blob.public_keys = mallory_pk;
        assert!(!blob.verify(&binding_key));
    }
}

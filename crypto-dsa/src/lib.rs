//! Post-quantum digital signatures (ML-DSA-65, NIST FIPS 204).
//!
//! Wraps `libcrux-ml-dsa` behind fixed-size byte-array types with serde and
//! zeroize, mirroring the `crypto-kem` wrapper. Signing is hedged: callers
//! supply fresh randomness alongside the deterministic key material.

use libcrux_ml_dsa::ml_dsa_65;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Verification (public) key size in bytes.
pub const VERIFICATION_KEY_SIZE: usize = 1952;

/// Signing (secret) key size in bytes.
pub const SIGNING_KEY_SIZE: usize = 4032;

/// Signature size in bytes.
pub const SIGNATURE_SIZE: usize = 3309;

/// Randomness consumed by key generation.
pub const KEY_GENERATION_RANDOMNESS_SIZE: usize = 32;

/// Randomness consumed by (hedged) signing.
pub const SIGNING_RANDOMNESS_SIZE: usize = 32;

mod serde_bytes_array {
    //! Serde helpers for byte arrays larger than serde's built-in impls,
    //! encoded as plain byte strings.

    use serde::de::{Error, Visitor};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        struct ArrayVisitor<const N: usize>;

        impl<'de, const N: usize> Visitor<'de> for ArrayVisitor<N> {
            type Value = [u8; N];

            fn expecting(&self, formatter: &mut core::fmt::Formatter) -> core::fmt::Result {
                write!(formatter, "{N} bytes")
            }

            fn visit_bytes<E: Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                v.try_into()
                    .map_err(|_| E::invalid_length(v.len(), &self))
            }

            fn visit_seq<A: serde::de::SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> Result<Self::Value, A::Error> {
                let mut out = [0u8; N];
                for (i, byte) in out.iter_mut().enumerate() {
                    *byte = seq
                        .next_element()?
                        .ok_or_else(|| A::Error::invalid_length(i, &self))?;
                }
                Ok(out)
            }
        }

        deserializer.deserialize_bytes(ArrayVisitor::<N>)
    }
}

/// ML-DSA-65 verification key.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct VerificationKey(#[serde(with = "serde_bytes_array")] [u8; VERIFICATION_KEY_SIZE]);

impl VerificationKey {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; VERIFICATION_KEY_SIZE] {
        &self.0
    }
}

impl From<[u8; VERIFICATION_KEY_SIZE]> for VerificationKey {
    fn from(bytes: [u8; VERIFICATION_KEY_SIZE]) -> Self {
        Self(bytes)
    }
}

impl Zeroize for VerificationKey {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// ML-DSA-65 signing key, zeroized on drop.
#[derive(Clone, serde::Serialize, serde::Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct SigningKey(#[serde(with = "serde_bytes_array")] [u8; SIGNING_KEY_SIZE]);

impl SigningKey {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; SIGNING_KEY_SIZE] {
        &self.0
    }
}

impl From<[u8; SIGNING_KEY_SIZE]> for SigningKey {
    fn from(bytes: [u8; SIGNING_KEY_SIZE]) -> Self {
        Self(bytes)
    }
}

/// ML-DSA-65 signature.
#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct Signature(#[serde(with = "serde_bytes_array")] [u8; SIGNATURE_SIZE]);

impl Signature {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }
}

impl From<[u8; SIGNATURE_SIZE]> for Signature {
    fn from(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        Self(bytes)
    }
}

impl Zeroize for Signature {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// Generates a key pair deterministically from the given randomness.
#[must_use]
pub fn generate_key_pair(
    randomness: [u8; KEY_GENERATION_RANDOMNESS_SIZE],
) -> (SigningKey, VerificationKey) {
    let pair = ml_dsa_65::generate_key_pair(randomness);
    let signing_key = SigningKey(*pair.signing_key.as_ref());
    let verification_key = VerificationKey(*pair.verification_key.as_ref());
    (signing_key, verification_key)
}

/// Signs `message` with `signing_key`, hedged with `randomness`.
///
/// Returns `None` only if the message context is rejected by the underlying
/// implementation, which cannot happen for the empty context used here.
#[must_use]
pub fn sign(
    signing_key: &SigningKey,
    message: &[u8],
    randomness: [u8; SIGNING_RANDOMNESS_SIZE],
) -> Option<Signature> {
    let sk = ml_dsa_65::MLDSA65SigningKey::new(signing_key.0);
    let signature = ml_dsa_65::sign(&sk, message, b"", randomness).ok()?;
    Some(Signature(*signature.as_ref()))
}

/// Verifies `signature` over `message` against `verification_key`.
#[must_use]
pub fn verify(verification_key: &VerificationKey, message: &[u8], signature: &Signature) -> bool {
    let vk = ml_dsa_65::MLDSA65VerificationKey::new(verification_key.0);
    let sig = ml_dsa_65::MLDSA65Signature::new(signature.0);
    ml_dsa_65::verify(&vk, message, b"", &sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify_roundtrip() {
        let (sk, vk) = generate_key_pair([1u8; KEY_GENERATION_RANDOMNESS_SIZE]);
        let sig = sign(&sk, b"message", [2u8; SIGNING_RANDOMNESS_SIZE]).expect("signing failed");
        assert!(verify(&vk, b"message", &sig));
    }

    #[test]
    fn test_deterministic_keygen() {
        let (sk1, vk1) = generate_key_pair([7u8; KEY_GENERATION_RANDOMNESS_SIZE]);
        let (sk2, vk2) = generate_key_pair([7u8; KEY_GENERATION_RANDOMNESS_SIZE]);
        assert_eq!(sk1.as_bytes(), sk2.as_bytes());
        assert_eq!(vk1.as_bytes(), vk2.as_bytes());
    }

    #[test]
    fn test_wrong_message_rejected() {
        let (sk, vk) = generate_key_pair([1u8; KEY_GENERATION_RANDOMNESS_SIZE]);
        let sig = sign(&sk, b"message", [2u8; SIGNING_RANDOMNESS_SIZE]).expect("signing failed");
        assert!(!verify(&vk, b"other message", &sig));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let (sk, _vk) = generate_key_pair([1u8; KEY_GENERATION_RANDOMNESS_SIZE]);
        let (_sk2, vk2) = generate_key_pair([2u8; KEY_GENERATION_RANDOMNESS_SIZE]);
        let sig = sign(&sk, b"message", [3u8; SIGNING_RANDOMNESS_SIZE]).expect("signing failed");
        assert!(!verify(&vk2, b"message", &sig));
    }

    #[test]
    fn test_corrupted_signature_rejected() {
        let (sk, vk) = generate_key_pair([1u8; KEY_GENERATION_RANDOMNESS_SIZE]);
        let sig = sign(&sk, b"message", [2u8; SIGNING_RANDOMNESS_SIZE]).expect("signing failed");
        let mut bytes = *sig.as_bytes();
        bytes[0] ^= 1;
        assert!(!verify(&vk, b"message", &Signature::from(bytes)));
    }
}

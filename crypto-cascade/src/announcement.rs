//! Sealed one-shot announcement envelopes.
//!
//! Wire format: `[routing_prefix | kem_ciphertext | aead_ciphertext]`.
//!
//! The routing prefix is a public hash of the recipient's KEM key. It lets a
//! client discard the overwhelming majority of broadcast announcements with
//! a single comparison instead of a KEM decapsulation; it is not a secret
//! and carries no authentication. Everything that matters is protected by
//! the AEAD layer keyed from the KEM shared secret.
//!
//! Building is two-phase, so the payload can embed a signature bound to this
//! specific envelope: `OutgoingAnnouncementPrecursor::new` performs the
//! encapsulation and exposes [`auth_key`](OutgoingAnnouncementPrecursor::auth_key);
//! the caller signs over that key, then calls
//! [`finalize`](OutgoingAnnouncementPrecursor::finalize) with the signed
//! payload. Opening mirrors this: the recipient gets the payload plus the
//! same auth key and verifies the embedded signature against it.

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crypto_aead as aead;
use crypto_kem as kem;
use crypto_rng as rng;

/// Size in bytes of the recipient-discoverable routing prefix.
pub const ROUTING_PREFIX_SIZE: usize = 16;

const ROUTING_PREFIX_SALT: &[u8] = b"cascade.announce.route.salt-----";
const ENVELOPE_KDF_SALT: &[u8] = b"cascade.announce.kdf.salt-------";

/// Computes the routing prefix under which announcements for the holder of
/// `kem_public_key` are recognized.
#[must_use]
pub fn routing_prefix_for(kem_public_key: &kem::PublicKey) -> [u8; ROUTING_PREFIX_SIZE] {
    let mut kdf = crypto_kdf::Extract::new(ROUTING_PREFIX_SALT);
    kdf.input_item(kem_public_key.as_bytes());
    let expander = kdf.finalize();
    let mut prefix = [0u8; ROUTING_PREFIX_SIZE];
    expander.expand(b"cascade.announce.route", &mut prefix);
    prefix
}

/// Derives the envelope's AEAD key, nonce and auth key from the KEM output.
fn envelope_keys(
    shared_secret: &[u8; kem::SHARED_SECRET_SIZE],
    kem_ciphertext: &kem::Ciphertext,
) -> (aead::Key, aead::Nonce, [u8; 32]) {
    let mut kdf = crypto_kdf::Extract::new(ENVELOPE_KDF_SALT);
    kdf.input_item(shared_secret);
    kdf.input_item(kem_ciphertext.as_bytes());
    let expander = kdf.finalize();

    let mut key_bytes = [0u8; aead::KEY_SIZE];
    expander.expand(b"cascade.announce.key", &mut key_bytes);
    let key = aead::Key::from(key_bytes);
    key_bytes.zeroize();

    let mut nonce_bytes = [0u8; aead::NONCE_SIZE];
    expander.expand(b"cascade.announce.nonce", &mut nonce_bytes);

    let mut auth_key = [0u8; 32];
    expander.expand(b"cascade.announce.auth", &mut auth_key);

    (key, aead::Nonce::from(nonce_bytes), auth_key)
}

/// An announcement in construction: encapsulation done, payload pending.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct OutgoingAnnouncementPrecursor {
    routing_prefix: [u8; ROUTING_PREFIX_SIZE],
    kem_ciphertext: kem::Ciphertext,
    shared_secret: [u8; kem::SHARED_SECRET_SIZE],
}

impl OutgoingAnnouncementPrecursor {
    /// Encapsulates fresh key material to the recipient.
    #[must_use]
    pub fn new(recipient_kem_public_key: &kem::PublicKey) -> Self {
        let mut kem_randomness = [0u8; kem::ENCAPSULATION_RANDOMNESS_SIZE];
        rng::fill_buffer(&mut kem_randomness);
        let (kem_ciphertext, shared_secret) =
            kem::encapsulate(recipient_kem_public_key, kem_randomness);
        kem_randomness.zeroize();

        Self {
            routing_prefix: routing_prefix_for(recipient_kem_public_key),
            kem_ciphertext,
            shared_secret,
        }
    }

    /// The binding key for signatures embedded in this envelope's payload.
    #[must_use]
    pub fn auth_key(&self) -> [u8; 32] {
        let (_, _, auth_key) = envelope_keys(&self.shared_secret, &self.kem_ciphertext);
        auth_key
    }

    /// Seals `payload` and returns the announcement wire bytes.
    #[must_use]
    pub fn finalize(self, payload: &[u8]) -> Vec<u8> {
        let (key, nonce, _) = envelope_keys(&self.shared_secret, &self.kem_ciphertext);
        let ciphertext = aead::encrypt(&key, &nonce, payload, &self.routing_prefix);
        [
            self.routing_prefix.as_slice(),
            self.kem_ciphertext.as_bytes().as_slice(),
            &ciphertext,
        ]
        .concat()
    }
}

/// A successfully opened announcement.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct OpenedAnnouncement {
    /// The decrypted payload.
    pub payload: Vec<u8>,
    /// Binding key for verifying signatures embedded in the payload.
    pub auth_key: [u8; 32],
}

/// Opens announcements addressed to one recipient.
pub struct IncomingAnnouncementPrecursor;

impl IncomingAnnouncementPrecursor {
    /// Attempts to open announcement bytes with the recipient's keys.
    ///
    /// Returns `None` for anything that is not a well-formed announcement
    /// sealed to `our_kem_public_key`: wrong routing prefix, truncated
    /// input, or an AEAD authentication failure. All of these are expected
    /// outcomes when scanning a public broadcast feed.
    #[must_use]
    pub fn try_from_bytes(
        bytes: &[u8],
        our_kem_public_key: &kem::PublicKey,
        our_kem_secret_key: &kem::SecretKey,
    ) -> Option<OpenedAnnouncement> {
        let prefix: [u8; ROUTING_PREFIX_SIZE] =
            bytes.get(..ROUTING_PREFIX_SIZE)?.try_into().ok()?;
        if prefix != routing_prefix_for(our_kem_public_key) {
            return None;
        }

        let kem_ciphertext: [u8; kem::CIPHERTEXT_SIZE] = bytes
            .get(ROUTING_PREFIX_SIZE..ROUTING_PREFIX_SIZE + kem::CIPHERTEXT_SIZE)?
            .try_into()
            .ok()?;
        let kem_ciphertext = kem::Ciphertext::from(kem_ciphertext);
        let ciphertext = bytes.get(ROUTING_PREFIX_SIZE + kem::CIPHERTEXT_SIZE..)?;

        let shared_secret = Zeroizing::new(kem::decapsulate(our_kem_secret_key, &kem_ciphertext));
        let (key, nonce, auth_key) = envelope_keys(&shared_secret, &kem_ciphertext);
        let payload = aead::decrypt(&key, &nonce, ciphertext, &prefix)?;

        Some(OpenedAnnouncement { payload, auth_key })
    }
}

//! Cascade protocol: sealed announcements and forward-ratcheting sessions.
//!
//! The cascade is the cryptographic core of the messaging engine. It covers
//! two concerns:
//!
//! - **Announcements** ([`announcement`]): one-shot envelopes sealed to a
//!   recipient's ML-KEM public key, carrying the material needed to bootstrap
//!   a session. Only the intended recipient can open one; everyone else gets
//!   a cheap, silent non-match.
//! - **Sessions** ([`chain`], [`cascade`]): a pair of one-way BLAKE3 key
//!   chains, one per direction. Each chain index yields a *seeker* (the
//!   public lookup token under which the next message is posted on the
//!   message board), a message key, and a nonce. Advancing the chain hashes
//!   the key forward and drops the old one, so compromise of current state
//!   never exposes past traffic.
//!
//! Message data never identifies sender or recipient on the wire: the board
//! sees only `(seeker, ciphertext)` pairs, and seekers are indistinguishable
//! from random to anyone without the chain key.

mod announcement;
mod cascade;
mod chain;

pub use announcement::{
    routing_prefix_for, IncomingAnnouncementPrecursor, OpenedAnnouncement,
    OutgoingAnnouncementPrecursor, ROUTING_PREFIX_SIZE,
};
pub use cascade::{Cascade, CascadeRole, ReceivedEnvelope, SendOutput};
pub use chain::{ChainState, SEEKER_SIZE};

/// Size in bytes of a session bootstrap secret.
pub const BOOTSTRAP_SECRET_SIZE: usize = 32;

/// Size in bytes of a bootstrap identifier.
pub const BOOTSTRAP_ID_SIZE: usize = 32;

const BOOTSTRAP_ID_SALT: &[u8] = b"cascade.bootstrap.id.salt-------";

/// Derives the public identifier of a bootstrap secret.
///
/// The identifier names a session keying epoch (e.g. in reciprocal
/// confirmation announcements) without revealing the secret itself.
#[must_use]
pub fn bootstrap_id(secret: &[u8; BOOTSTRAP_SECRET_SIZE]) -> [u8; BOOTSTRAP_ID_SIZE] {
    let mut kdf = crypto_kdf::Extract::new(BOOTSTRAP_ID_SALT);
    kdf.input_item(secret);
    let expander = kdf.finalize();
    let mut id = [0u8; BOOTSTRAP_ID_SIZE];
    expander.expand(b"cascade.bootstrap.id", &mut id);
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_id_deterministic() {
        let secret = [5u8; BOOTSTRAP_SECRET_SIZE];
        assert_eq!(bootstrap_id(&secret), bootstrap_id(&secret));
    }

    #[test]
    fn test_bootstrap_id_hides_secret() {
        let a = bootstrap_id(&[5u8; BOOTSTRAP_SECRET_SIZE]);
        let b = bootstrap_id(&[6u8; BOOTSTRAP_SECRET_SIZE]);
        assert_ne!(a, b);
        assert_ne!(a, [5u8; BOOTSTRAP_ID_SIZE]);
    }
}

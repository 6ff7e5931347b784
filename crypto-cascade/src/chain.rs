//! One-way key chains.
//!
//! A [`ChainState`] is a 32-byte chain key plus a monotonically increasing
//! index. Each index expands three independent values: the seeker (public
//! lookup token), the message key, and the message nonce. Advancing hashes
//! the chain key forward; the previous key is not recoverable from the next,
//! which is what makes discarded state stay discarded.
//!
//! All derivations are pure: peeking at upcoming seekers clones the state
//! and never mutates the live chain.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crypto_aead as aead;

/// Size in bytes of a seeker token.
pub const SEEKER_SIZE: usize = 32;

const CHAIN_KDF_SALT: &[u8] = b"cascade.chain.kdf.salt----------";

fn chain_expander(key: &[u8; 32]) -> crypto_kdf::Expander {
    let mut kdf = crypto_kdf::Extract::new(CHAIN_KDF_SALT);
    kdf.input_item(key);
    kdf.finalize()
}

/// One direction of a cascade session.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct ChainState {
    key: [u8; 32],
    index: u64,
}

impl ChainState {
    /// Seeds a chain from keying material under a channel label.
    ///
    /// The label separates the two directions of a session (and any other
    /// chains derived from the same material).
    #[must_use]
    pub fn from_keying_material(material: &[&[u8]], channel_label: &[u8]) -> Self {
        let mut kdf = crypto_kdf::Extract::new(CHAIN_KDF_SALT);
        for item in material {
            kdf.input_item(item);
        }
        let expander = kdf.finalize();
        let mut key = [0u8; 32];
        expander.expand(channel_label, &mut key);
        Self { key, index: 0 }
    }

    /// Current chain index.
    #[must_use]
    pub fn index(&self) -> u64 {
        self.index
    }

    /// The seeker token for the current index.
    #[must_use]
    pub fn seeker(&self) -> [u8; SEEKER_SIZE] {
        let mut seeker = [0u8; SEEKER_SIZE];
        chain_expander(&self.key).expand(b"cascade.chain.seeker", &mut seeker);
        seeker
    }

    /// The AEAD key for the current index.
    #[must_use]
    pub fn message_key(&self) -> aead::Key {
        let mut key_bytes = [0u8; aead::KEY_SIZE];
        chain_expander(&self.key).expand(b"cascade.chain.msg.key", &mut key_bytes);
        let key = aead::Key::from(key_bytes);
        key_bytes.zeroize();
        key
    }

    /// The AEAD nonce for the current index.
    ///
    /// Each index has its own message key, so this nonce is trivially unique
    /// for its key; it is derived rather than fixed so that key and nonce
    /// share no structure.
    #[must_use]
    pub fn message_nonce(&self) -> aead::Nonce {
        let mut nonce_bytes = [0u8; aead::NONCE_SIZE];
        chain_expander(&self.key).expand(b"cascade.chain.msg.nonce", &mut nonce_bytes);
        aead::Nonce::from(nonce_bytes)
    }

    /// The state one step forward. Pure; the current state is unchanged.
    ///
    /// Returns `None` if the index would wrap. Chain indices underpin the
    /// at-most-once seeker guarantee, so exhaustion is terminal for the
    /// session rather than a silent reset.
    #[must_use]
    pub fn advanced(&self) -> Option<Self> {
        let index = self.index.checked_add(1)?;
        let mut key = [0u8; 32];
        chain_expander(&self.key).expand(b"cascade.chain.next", &mut key);
        Some(Self { key, index })
    }

    /// The next `count` seekers starting at the current index. Pure.
    #[must_use]
    pub fn upcoming_seekers(&self, count: u64) -> Vec<[u8; SEEKER_SIZE]> {
        let mut seekers = Vec::with_capacity(count as usize);
        let mut state = self.clone();
        for _ in 0..count {
            seekers.push(state.seeker());
            match state.advanced() {
                Some(next) => state = next,
                None => break,
            }
        }
        seekers
    }

    #[cfg(test)]
    pub(crate) fn test_state_at(key: [u8; 32], index: u64) -> Self {
        Self { key, index }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_chain() -> ChainState {
        ChainState::from_keying_material(&[b"bootstrap secret"], b"test.channel")
    }

    #[test]
    fn test_chain_deterministic() {
        let a = test_chain();
        let b = test_chain();
        assert_eq!(a.seeker(), b.seeker());
        assert_eq!(
            a.advanced().unwrap().seeker(),
            b.advanced().unwrap().seeker()
        );
    }

    #[test]
    fn test_channel_label_separates_chains() {
        let a = ChainState::from_keying_material(&[b"secret"], b"channel.a");
        let b = ChainState::from_keying_material(&[b"secret"], b"channel.b");
        assert_ne!(a.seeker(), b.seeker());
    }

    #[test]
    fn test_advanced_is_pure() {
        let chain = test_chain();
        let seeker_before = chain.seeker();
        let _ = chain.advanced().unwrap();
        assert_eq!(chain.seeker(), seeker_before);
        assert_eq!(chain.index(), 0);
    }

    #[test]
    fn test_index_increments() {
        let chain = test_chain();
        let next = chain.advanced().unwrap();
        assert_eq!(chain.index(), 0);
        assert_eq!(next.index(), 1);
    }

    #[test]
    fn test_seekers_differ_per_index() {
        let chain = test_chain();
        let next = chain.advanced().unwrap();
        assert_ne!(chain.seeker(), next.seeker());
        assert_ne!(
            chain.message_key().as_bytes(),
            next.message_key().as_bytes()
        );
    }

    #[test]
    fn test_upcoming_seekers_window() {
        let chain = test_chain();
        let window = chain.upcoming_seekers(4);
        assert_eq!(window.len(), 4);
        assert_eq!(window[0], chain.seeker());
        assert_eq!(window[1], chain.advanced().unwrap().seeker());
        // pure: live chain untouched
        assert_eq!(chain.index(), 0);
    }

    #[test]
    fn test_index_exhaustion() {
        let chain = ChainState::test_state_at([1u8; 32], u64::MAX);
        assert!(chain.advanced().is_none());
        // the window stops at exhaustion instead of wrapping
        assert_eq!(chain.upcoming_seekers(4).len(), 1);
    }

    #[test]
    fn test_seeker_key_nonce_independent() {
        let chain = test_chain();
        assert_ne!(&chain.seeker(), chain.message_key().as_bytes());
    }
}

//! Per-peer session state machine.
//!
//! A [`Cascade`] holds the two key chains of one session (send and receive)
//! plus the acknowledgment bookkeeping that lets peers release message board
//! slots they no longer need:
//!
//! - `outstanding` records the seekers of our own sent messages until the
//!   peer confirms receipt. Its length is the session lag.
//! - `pending_acks` collects the peer's seekers we have consumed (or skipped
//!   past); they ride along inside the next message we send.
//!
//! Receiving tolerates forward gaps: if the peer advanced its send chain
//! without a message ever reaching the board (failed post, expired slot),
//! the receive side scans a bounded window of upcoming seekers and jumps
//! past the gap. Skipped indices are permanently dead — the receive chain
//! never moves backwards, so a consumed or skipped `(seeker, ciphertext)`
//! pair can never decrypt again.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::chain::{ChainState, SEEKER_SIZE};
use crate::BOOTSTRAP_SECRET_SIZE;
use crypto_aead as aead;

const CHANNEL_INITIATOR: &[u8] = b"cascade.chan.initiator";
const CHANNEL_RESPONDER: &[u8] = b"cascade.chan.responder";
const CHANNEL_PAIRED: &[u8] = b"cascade.chan.paired";

/// Upper bound on queued acknowledgments. Oldest entries are shed first;
/// an unreleased board slot eventually expires on its own, so dropping an
/// ack costs storage, not correctness.
const MAX_PENDING_ACKS: usize = 128;

/// Which side of the bootstrap announcement this cascade instance is.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CascadeRole {
    /// Created the announcement carrying the bootstrap secret.
    Initiator,
    /// Opened the announcement.
    Responder,
}

/// Output of encrypting one message.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SendOutput {
    /// Board key under which `data` should be posted.
    pub seeker: Vec<u8>,
    /// Encrypted envelope to post.
    pub data: Vec<u8>,
}

/// Output of successfully decrypting one message.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ReceivedEnvelope {
    /// The decrypted payload handed up to the session layer.
    pub payload: Vec<u8>,
    /// Seekers of our own past messages the peer has now confirmed;
    /// the caller can release their board slots.
    pub newly_acknowledged_self_seekers: Vec<Vec<u8>>,
}

/// Envelope structure carried inside each message's AEAD ciphertext.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct Envelope {
    /// Seekers of the peer's messages we had consumed when this was sent.
    ack_seekers: Vec<[u8; SEEKER_SIZE]>,
    /// Opaque payload owned by the layer above.
    payload: Vec<u8>,
}

/// A sent message awaiting acknowledgment.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct OutstandingSeeker {
    seeker: [u8; SEEKER_SIZE],
}

/// The forward-ratcheting state of one session.
#[derive(Serialize, Deserialize, Zeroize)]
pub struct Cascade {
    send: ChainState,
    recv: ChainState,
    // Deques may reallocate without zeroing the old buffer; cleared
    // item-by-item in Drop instead.
    #[zeroize(skip)]
    outstanding: VecDeque<Box<OutstandingSeeker>>,
    pending_acks: Vec<[u8; SEEKER_SIZE]>,
}

impl Drop for Cascade {
    fn drop(&mut self) {
        // Each dropped item zeroizes itself.
        self.outstanding.clear();

        // Wipe the rest via the derived impl (deque is skipped).
        Zeroize::zeroize(self);
    }
}

impl ZeroizeOnDrop for Cascade {}

impl Cascade {
    /// Builds a session from a single announcement's bootstrap secret.
    ///
    /// Both directions derive from the one secret under role-separated
    /// labels, so the responder can send — and the initiator can receive —
    /// as soon as the announcement has been opened.
    #[must_use]
    pub fn from_initiator_bootstrap(
        secret: &[u8; BOOTSTRAP_SECRET_SIZE],
        role: CascadeRole,
    ) -> Self {
        let initiator_chain = ChainState::from_keying_material(&[secret], CHANNEL_INITIATOR);
        let responder_chain = ChainState::from_keying_material(&[secret], CHANNEL_RESPONDER);
        let (send, recv) = match role {
            CascadeRole::Initiator => (initiator_chain, responder_chain),
            CascadeRole::Responder => (responder_chain, initiator_chain),
        };
        Self {
            send,
            recv,
            outstanding: VecDeque::new(),
            pending_acks: Vec::new(),
        }
    }

    /// Builds a session from two crossed announcements.
    ///
    /// When both peers initiated independently, each side seeds its send
    /// chain from `[own, peer]` and its receive chain from `[peer, own]`;
    /// the order-dependent extraction makes the two sides' chains line up
    /// without further negotiation.
    #[must_use]
    pub fn from_bootstrap_pair(
        own_secret: &[u8; BOOTSTRAP_SECRET_SIZE],
        peer_secret: &[u8; BOOTSTRAP_SECRET_SIZE],
    ) -> Self {
        Self {
            send: ChainState::from_keying_material(&[own_secret, peer_secret], CHANNEL_PAIRED),
            recv: ChainState::from_keying_material(&[peer_secret, own_secret], CHANNEL_PAIRED),
            outstanding: VecDeque::new(),
            pending_acks: Vec::new(),
        }
    }

    /// Encrypts `payload` at the current send index and advances the chain.
    ///
    /// Pending acknowledgments are drained into the envelope. Returns `None`
    /// only when the send index is exhausted, in which case the state is
    /// untouched and the session must be closed by the caller.
    #[must_use]
    pub fn encrypt_message(&mut self, payload: &[u8]) -> Option<SendOutput> {
        let advanced = self.send.advanced()?;

        let seeker = self.send.seeker();
        let envelope = Envelope {
            ack_seekers: std::mem::take(&mut self.pending_acks),
            payload: payload.to_vec(),
        };
        let envelope_bytes = Zeroizing::new(
            bincode::serde::encode_to_vec(&envelope, bincode::config::standard())
                .expect("envelope serialization cannot fail"),
        );

        let data = aead::encrypt(
            &self.send.message_key(),
            &self.send.message_nonce(),
            &envelope_bytes,
            &seeker,
        );

        self.outstanding
            .push_back(Box::new(OutstandingSeeker { seeker }));
        self.send = advanced;

        Some(SendOutput {
            seeker: seeker.to_vec(),
            data,
        })
    }

    /// The next `lookahead` seekers the peer may use. Pure.
    #[must_use]
    pub fn expected_seekers(&self, lookahead: u64) -> Vec<Vec<u8>> {
        self.recv
            .upcoming_seekers(lookahead)
            .into_iter()
            .map(|seeker| seeker.to_vec())
            .collect()
    }

    /// Attempts to decrypt a board entry against the receive window.
    ///
    /// Scans up to `lookahead` upcoming receive states for one whose seeker
    /// matches. On success the receive chain advances one past the matched
    /// index; the matched and any skipped seekers are queued for
    /// acknowledgment to the peer. On any failure — no matching seeker,
    /// authentication failure, malformed envelope — the state is untouched
    /// and `None` is returned.
    #[must_use]
    pub fn try_decrypt(
        &mut self,
        seeker: &[u8],
        data: &[u8],
        lookahead: u64,
    ) -> Option<ReceivedEnvelope> {
        let mut state = self.recv.clone();
        let mut passed_seekers: Vec<[u8; SEEKER_SIZE]> = Vec::new();

        for _ in 0..lookahead {
            let candidate = state.seeker();
            if candidate == seeker {
                let plaintext = Zeroizing::new(aead::decrypt(
                    &state.message_key(),
                    &state.message_nonce(),
                    data,
                    &candidate,
                )?);
                let envelope: Envelope =
                    bincode::serde::decode_from_slice(&plaintext, bincode::config::standard())
                        .ok()?
                        .0;

                // commit: jump past the matched index
                self.recv = state.advanced()?;
                passed_seekers.push(candidate);
                self.pending_acks.extend(passed_seekers);
                if self.pending_acks.len() > MAX_PENDING_ACKS {
                    let excess = self.pending_acks.len() - MAX_PENDING_ACKS;
                    self.pending_acks.drain(..excess);
                }

                let newly_acknowledged = self.absorb_acks(&envelope.ack_seekers);

                return Some(ReceivedEnvelope {
                    payload: envelope.payload.clone(),
                    newly_acknowledged_self_seekers: newly_acknowledged,
                });
            }
            passed_seekers.push(candidate);
            state = state.advanced()?;
        }
        None
    }

    /// Removes acknowledged seekers from the outstanding ledger and returns
    /// the ones that were newly confirmed.
    fn absorb_acks(&mut self, ack_seekers: &[[u8; SEEKER_SIZE]]) -> Vec<Vec<u8>> {
        let mut newly_acknowledged = Vec::new();
        self.outstanding.retain(|entry| {
            if ack_seekers.contains(&entry.seeker) {
                newly_acknowledged.push(entry.seeker.to_vec());
                false
            } else {
                true
            }
        });
        newly_acknowledged
    }

    /// Number of sent messages not yet acknowledged by the peer.
    #[must_use]
    pub fn lag_length(&self) -> u64 {
        self.outstanding.len() as u64
    }

    /// Current send-chain index (number of messages sent).
    #[must_use]
    pub fn send_index(&self) -> u64 {
        self.send.index()
    }

    /// Current receive-chain index.
    #[must_use]
    pub fn receive_index(&self) -> u64 {
        self.recv.index()
    }
}

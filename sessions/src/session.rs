//! Per-peer session state and announcement handling.
//!
//! A session is established through announcements posted to a public board.
//! An announcement is a cascade envelope sealed to the peer's KEM key whose
//! payload is a signed [`auth::AuthBlob`] carrying a fresh session bootstrap
//! secret. Whoever opens it can derive both directions of the session's key
//! chains immediately, which is why *receiving* an announcement is enough to
//! start replying; the side that *initiated* stays pending until the peer
//! confirms — with a reciprocal announcement or simply by sending a message.
//!
//! # Session lifecycle
//!
//! ```text
//!   establish_outgoing_session          feed_incoming_announcement
//!              |                                   |
//!         Pending (Initiated)              Active (Received)
//!              |  confirmation /
//!              |  crossed announcement /
//!              |  first decrypted message
//!              v
//!           Active  ----fatal ratchet error / kill---->  Closed
//! ```
//!
//! Phases only ever move forward. A closed session stays in the peer table
//! (so its fate is observable) until the caller explicitly discards it.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crypto_cascade::{
    bootstrap_id, Cascade, CascadeRole, IncomingAnnouncementPrecursor,
    OutgoingAnnouncementPrecursor, BOOTSTRAP_ID_SIZE, BOOTSTRAP_SECRET_SIZE,
};

/// Payload signed into every announcement.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub(crate) struct SessionInitPayload {
    /// Fresh secret seeding the session's key chains.
    pub(crate) bootstrap_secret: [u8; BOOTSTRAP_SECRET_SIZE],
    /// Set when this announcement confirms an initiation we received:
    /// the bootstrap id of the announcement being confirmed.
    pub(crate) in_reply_to: Option<[u8; BOOTSTRAP_ID_SIZE]>,
    /// Creation time, milliseconds since the Unix epoch.
    pub(crate) unix_timestamp_millis: u128,
}

/// Signed blob plus free-form user data, sealed inside the announcement.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub(crate) struct AuthPayload {
    pub(crate) auth_blob: auth::AuthBlob,
    pub(crate) user_data: Vec<u8>,
}

/// Plaintext structure of every session message.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub(crate) struct MessagePayload {
    /// Sender's user id; checked against the session's peer on receipt.
    pub(crate) sender_id: auth::UserId,
    /// Creation time, milliseconds since the Unix epoch.
    pub(crate) unix_timestamp_millis: u128,
    /// Message contents as provided by the caller.
    pub(crate) contents: Vec<u8>,
}

/// Output from sending a message: post `data` on the board under `seeker`.
#[derive(Debug, Zeroize, ZeroizeOnDrop)]
pub struct SendOutgoingMessageOutput {
    /// Message timestamp (milliseconds since Unix epoch).
    pub timestamp: u128,
    /// Board key for this message.
    pub seeker: Vec<u8>,
    /// Encrypted message data to post.
    pub data: Vec<u8>,
}

/// Output from successfully decrypting an incoming message.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct FeedIncomingMessageOutput {
    /// Message timestamp (milliseconds since Unix epoch).
    pub timestamp: u128,
    /// Decrypted message contents.
    pub message: Vec<u8>,
    /// Seekers of our own messages the peer has confirmed; their board
    /// slots can be released.
    pub newly_acknowledged_self_seekers: Vec<Vec<u8>>,
    /// User id of the sending peer.
    pub user_id: auth::UserId,
}

/// Which side created the session's founding announcement.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum SessionDirection {
    /// We announced to the peer.
    Initiated,
    /// The peer announced to us.
    Received,
}

/// Lifecycle phase of a session. Ordered: phases never move backward.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub(crate) enum SessionPhase {
    Pending,
    Active,
    Closed,
}

/// An announcement we created, kept until the session it opens resolves.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct OutgoingInitiationRequest {
    pub(crate) bootstrap_secret: [u8; BOOTSTRAP_SECRET_SIZE],
    pub(crate) bootstrap_id: [u8; BOOTSTRAP_ID_SIZE],
    pub(crate) timestamp_millis: u128,
}

impl OutgoingInitiationRequest {
    /// Builds an announcement to `peer_pk` and returns its wire bytes.
    ///
    /// `in_reply_to` marks the announcement as a confirmation of a received
    /// initiation instead of a fresh one.
    pub(crate) fn new(
        our_pk: &auth::UserPublicKeys,
        our_sk: &auth::UserSecretKeys,
        peer_pk: &auth::UserPublicKeys,
        user_data: Vec<u8>,
        in_reply_to: Option<[u8; BOOTSTRAP_ID_SIZE]>,
    ) -> (Vec<u8>, Self) {
        let timestamp_millis = crate::utils::timestamp_millis();

        let precursor = OutgoingAnnouncementPrecursor::new(&peer_pk.kem_public_key);
        let auth_key = precursor.auth_key();

        let bootstrap_secret = {
            let mut secret = [0u8; BOOTSTRAP_SECRET_SIZE];
            crypto_rng::fill_buffer(&mut secret);
            secret
        };

        let init_payload = SessionInitPayload {
            bootstrap_secret,
            in_reply_to,
            unix_timestamp_millis: timestamp_millis,
        };
        let init_payload_bytes = Zeroizing::new(
            bincode::serde::encode_to_vec(&init_payload, bincode::config::standard())
                .expect("failed to serialize session initiation payload"),
        );

        let auth_payload = AuthPayload {
            auth_blob: auth::AuthBlob::new(
                our_pk.clone(),
                our_sk,
                init_payload_bytes.to_vec(),
                &auth_key,
            ),
            user_data,
        };
        let auth_payload_bytes = Zeroizing::new(
            bincode::serde::encode_to_vec(&auth_payload, bincode::config::standard())
                .expect("failed to serialize announcement payload"),
        );

        let announcement_bytes = precursor.finalize(&auth_payload_bytes);

        (
            announcement_bytes,
            Self {
                bootstrap_secret,
                bootstrap_id: bootstrap_id(&bootstrap_secret),
                timestamp_millis,
            },
        )
    }
}

/// An announcement received from a peer, parsed and verified.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct IncomingInitiationRequest {
    /// The announcer's long-term public keys, as signed by them.
    pub(crate) origin_public_keys: auth::UserPublicKeys,
    pub(crate) bootstrap_secret: [u8; BOOTSTRAP_SECRET_SIZE],
    pub(crate) bootstrap_id: [u8; BOOTSTRAP_ID_SIZE],
    pub(crate) in_reply_to: Option<[u8; BOOTSTRAP_ID_SIZE]>,
    pub(crate) timestamp_millis: u128,
}

impl IncomingInitiationRequest {
    /// Tries to parse announcement bytes addressed to us.
    ///
    /// Returns the request plus the announcement's user data, or `None` for
    /// anything not sealed to our keys or failing signature verification —
    /// the routine outcome when scanning a public announcement feed.
    pub(crate) fn try_from(
        bytes: &[u8],
        our_pk: &auth::UserPublicKeys,
        our_sk: &auth::UserSecretKeys,
    ) -> Option<(Self, Vec<u8>)> {
        let opened = IncomingAnnouncementPrecursor::try_from_bytes(
            bytes,
            &our_pk.kem_public_key,
            &our_sk.kem_secret_key,
        )?;

        let auth_payload: AuthPayload =
            bincode::serde::decode_from_slice(&opened.payload, bincode::config::standard())
                .ok()?
                .0;

        if !auth_payload.auth_blob.verify(&opened.auth_key) {
            return None;
        }

        let init_payload: SessionInitPayload = bincode::serde::decode_from_slice(
            auth_payload.auth_blob.public_payload(),
            bincode::config::standard(),
        )
        .ok()?
        .0;

        Some((
            Self {
                origin_public_keys: auth_payload.auth_blob.public_keys().clone(),
                bootstrap_secret: init_payload.bootstrap_secret,
                bootstrap_id: bootstrap_id(&init_payload.bootstrap_secret),
                in_reply_to: init_payload.in_reply_to,
                timestamp_millis: init_payload.unix_timestamp_millis,
            },
            auth_payload.user_data.clone(),
        ))
    }
}

/// A session with one peer.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub(crate) struct Session {
    #[zeroize(skip)]
    pub(crate) phase: SessionPhase,
    #[zeroize(skip)]
    pub(crate) direction: SessionDirection,
    cascade: Cascade,
    pub(crate) peer_public_keys: auth::UserPublicKeys,
    /// Identifies the announcement that keyed this session.
    pub(crate) bootstrap_id: [u8; BOOTSTRAP_ID_SIZE],
    /// Our own bootstrap secret, retained while Pending in case the peer
    /// initiated simultaneously and the chains must be re-derived from the
    /// pair. Dropped on promotion.
    own_bootstrap_secret: Option<[u8; BOOTSTRAP_SECRET_SIZE]>,
    pub(crate) last_incoming_message_timestamp: u128,
    pub(crate) last_outgoing_message_timestamp: u128,
}

impl Session {
    /// New Pending session for an initiation we sent.
    pub(crate) fn from_initiated(
        outgoing: &OutgoingInitiationRequest,
        peer_public_keys: auth::UserPublicKeys,
    ) -> Self {
        Self {
            phase: SessionPhase::Pending,
            direction: SessionDirection::Initiated,
            cascade: Cascade::from_initiator_bootstrap(
                &outgoing.bootstrap_secret,
                CascadeRole::Initiator,
            ),
            peer_public_keys,
            bootstrap_id: outgoing.bootstrap_id,
            own_bootstrap_secret: Some(outgoing.bootstrap_secret),
            last_incoming_message_timestamp: 0,
            last_outgoing_message_timestamp: outgoing.timestamp_millis,
        }
    }

    /// New Active session for an initiation we received. One announcement
    /// is enough to derive both chains, so replies can start immediately.
    pub(crate) fn from_received(incoming: &IncomingInitiationRequest) -> Self {
        Self {
            phase: SessionPhase::Active,
            direction: SessionDirection::Received,
            cascade: Cascade::from_initiator_bootstrap(
                &incoming.bootstrap_secret,
                CascadeRole::Responder,
            ),
            peer_public_keys: incoming.origin_public_keys.clone(),
            bootstrap_id: incoming.bootstrap_id,
            own_bootstrap_secret: None,
            last_incoming_message_timestamp: incoming.timestamp_millis,
            last_outgoing_message_timestamp: 0,
        }
    }

    /// Advances the lifecycle phase. Backward transitions are rejected.
    pub(crate) fn advance_phase(&mut self, new_phase: SessionPhase) -> bool {
        if new_phase < self.phase {
            tracing::warn!(
                current = ?self.phase,
                requested = ?new_phase,
                "rejected backward session phase transition"
            );
            return false;
        }
        self.phase = new_phase;
        true
    }

    /// Promotes a Pending initiated session confirmed by the peer.
    /// The chains are already in place; only the phase moves.
    pub(crate) fn promote_confirmed(&mut self) {
        self.advance_phase(SessionPhase::Active);
        self.own_bootstrap_secret = None;
    }

    /// Promotes a Pending initiated session after a crossed initiation:
    /// both sides announced independently, so the chains are re-derived
    /// from the pair of bootstrap secrets.
    ///
    /// Returns false if this session no longer holds its own secret
    /// (it was already promoted).
    pub(crate) fn promote_crossed(&mut self, incoming: &IncomingInitiationRequest) -> bool {
        let Some(own_secret) = &self.own_bootstrap_secret else {
            return false;
        };
        self.cascade = Cascade::from_bootstrap_pair(own_secret, &incoming.bootstrap_secret);
        self.bootstrap_id = incoming.bootstrap_id;
        self.advance_phase(SessionPhase::Active);
        self.own_bootstrap_secret = None;
        true
    }

    /// Whether incoming board entries may match this session.
    ///
    /// Active sessions receive; so does a Pending initiated session, whose
    /// responder chain is live the moment the peer opens our announcement.
    pub(crate) fn can_receive(&self) -> bool {
        match self.phase {
            SessionPhase::Active => true,
            SessionPhase::Pending => self.direction == SessionDirection::Initiated,
            SessionPhase::Closed => false,
        }
    }

    pub(crate) fn expected_seekers(&self, lookahead: u64) -> Vec<Vec<u8>> {
        self.cascade.expected_seekers(lookahead)
    }

    pub(crate) fn lag_length(&self) -> u64 {
        self.cascade.lag_length()
    }

    /// Encrypts a message at the current send index.
    ///
    /// Returns `None` only on send-chain exhaustion; the caller must close
    /// the session in that case.
    pub(crate) fn send_outgoing_message(
        &mut self,
        sender_id: auth::UserId,
        contents: &[u8],
    ) -> Option<SendOutgoingMessageOutput> {
        let timestamp = crate::utils::timestamp_millis();

        let payload = MessagePayload {
            sender_id,
            unix_timestamp_millis: timestamp,
            contents: contents.to_vec(),
        };
        let payload_bytes = Zeroizing::new(
            bincode::serde::encode_to_vec(&payload, bincode::config::standard())
                .expect("failed to serialize message payload"),
        );

        let output = self.cascade.encrypt_message(&payload_bytes)?;
        self.last_outgoing_message_timestamp = timestamp;

        Some(SendOutgoingMessageOutput {
            timestamp,
            seeker: output.seeker.clone(),
            data: output.data.clone(),
        })
    }

    /// Attempts to decrypt a board entry for this session.
    ///
    /// The decrypted payload must name this session's peer as its sender.
    /// A mismatch drops the message; the ratchet has still advanced, since
    /// an entry that authenticated under this session's chain key cannot
    /// belong to anyone else.
    pub(crate) fn try_feed_incoming_message(
        &mut self,
        seeker: &[u8],
        data: &[u8],
        lookahead: u64,
    ) -> Option<FeedIncomingMessageOutput> {
        let peer_id = self.peer_public_keys.derive_id();

        let received = self.cascade.try_decrypt(seeker, data, lookahead)?;

        let payload: MessagePayload =
            bincode::serde::decode_from_slice(&received.payload, bincode::config::standard())
                .ok()?
                .0;

        if payload.sender_id != peer_id {
            tracing::warn!("decrypted message claims a sender other than the session peer");
            return None;
        }

        Some(FeedIncomingMessageOutput {
            timestamp: payload.unix_timestamp_millis,
            message: payload.contents.clone(),
            newly_acknowledged_self_seekers: received.newly_acknowledged_self_seekers.clone(),
            user_id: payload.sender_id.clone(),
        })
    }
}

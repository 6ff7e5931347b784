//! High-level session manager for multi-peer secure messaging.
//!
//! `SessionManager` is the public face of the engine. It owns the loaded
//! identity and the table of peer sessions, and it is the only component
//! allowed to mutate either — callers drive it from whatever event loop
//! they have and feed it bytes fetched from the outside world. The manager
//! itself never performs I/O.
//!
//! # Responsibilities
//!
//! - **Session lifecycle**: create sessions from outgoing or incoming
//!   announcements, promote them on confirmation, close them on fatal
//!   ratchet errors, erase them on explicit discard.
//! - **Message board coordination**: aggregate the seekers to poll and
//!   route fetched `(seeker, data)` pairs to the right peer's ratchet.
//! - **Keep-alive**: report which sessions have gone quiet so the caller
//!   can send empty keep-alive messages.
//! - **State persistence**: serialize the whole manager into a single
//!   encrypted blob and restore from it.
//!
//! # Failure semantics
//!
//! Input that simply isn't for us — foreign announcements, unknown seekers,
//! corrupted board entries, replays — yields `None`/`Ok(None)` and is never
//! an error. Misusing the API (sending on a non-active session, operating
//! on an unknown peer, acting without a loaded identity) yields a typed
//! [`SessionError`]. A fatal ratchet condition closes the affected session
//! and leaves every other session untouched.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use auth::UserId;

use crate::session::{
    FeedIncomingMessageOutput, IncomingInitiationRequest, OutgoingInitiationRequest,
    SendOutgoingMessageOutput, Session, SessionDirection, SessionPhase,
};
use crate::utils::timestamp_millis;

/// Result from processing an incoming announcement.
#[derive(Clone, Debug, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct AnnouncementResult {
    /// The public keys of the peer who sent the announcement.
    pub announcer_public_keys: auth::UserPublicKeys,
    /// Unix timestamp in milliseconds when the announcement was created.
    pub timestamp_millis: u128,
    /// Arbitrary user data embedded in the announcement (can be empty).
    pub user_data: Vec<u8>,
}

/// Externally visible status of a peer's session.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SessionStatus {
    /// We initiated and are waiting for the peer's confirmation.
    Pending,
    /// Both sides can send and receive.
    Active,
    /// The session hit a fatal error; no further I/O is possible until the
    /// peer is discarded and re-established.
    Closed,
    /// This peer is not in the session manager.
    UnknownPeer,
}

/// Typed errors for API misuse and fatal session conditions.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The peer is not in the session manager.
    #[error("peer is not known to the session manager")]
    UnknownPeer,
    /// The session exists but has not been confirmed by the peer yet.
    #[error("session with this peer is not active yet")]
    SessionNotActive,
    /// The session was closed by a fatal error.
    #[error("session with this peer is closed")]
    SessionClosed,
    /// Too many sent messages are unacknowledged; wait for the peer.
    #[error("session has reached its unacknowledged message limit")]
    SessionSaturated,
    /// No identity is loaded into the manager.
    #[error("identity secret keys are not loaded")]
    IdentityUnavailable,
    /// The session ratchet exhausted its index space; the session is now
    /// closed.
    #[error("session ratchet index space is exhausted")]
    RatchetExhausted,
    /// Refusing to establish a session with our own user id.
    #[error("cannot establish a session with ourselves")]
    SelfPeer,
}

/// Tunable limits and windows for the session manager.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct SessionManagerConfig {
    /// The maximum age of an incoming announcement in milliseconds.
    pub max_incoming_announcement_age_millis: u128,
    /// The maximum clock-skew future time of an incoming announcement in
    /// milliseconds.
    pub max_incoming_announcement_future_millis: u128,

    /// The maximum age of an incoming message in milliseconds.
    pub max_incoming_message_age_millis: u128,
    /// The maximum clock-skew future time of an incoming message in
    /// milliseconds.
    pub max_incoming_message_future_millis: u128,

    /// The interval after which a quiet session should receive a
    /// keep-alive message.
    pub keep_alive_interval_millis: u128,

    /// The maximum number of unacknowledged messages before sending blocks.
    pub max_session_lag_length: u64,

    /// How many upcoming seekers to watch per peer. Bounds both the board
    /// polling set and the tolerated forward gap after lost messages.
    pub seeker_lookahead: u64,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            max_incoming_announcement_age_millis: 604_800_000, // 1 week
            max_incoming_announcement_future_millis: 60_000,   // 1 minute
            max_incoming_message_age_millis: 604_800_000,      // 1 week
            max_incoming_message_future_millis: 60_000,        // 1 minute
            keep_alive_interval_millis: 86_400_000,            // 1 day
            max_session_lag_length: 10_000,
            seeker_lookahead: 8,
        }
    }
}

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct PeerState {
    session: Session,
    /// Timestamp of the newest announcement consumed from this peer;
    /// older announcements are replays or reordered and are ignored.
    last_announcement_timestamp: u128,
}

/// The engine's top-level orchestrator. See the module docs.
#[derive(Serialize, Deserialize)]
pub struct SessionManager {
    config: SessionManagerConfig,
    identity: Option<auth::Identity>,
    peers: HashMap<UserId, Box<PeerState>>,
}

impl Zeroize for SessionManager {
    fn zeroize(&mut self) {
        self.peers.clear();
        self.identity.zeroize();
        self.config.zeroize();
    }
}

impl ZeroizeOnDrop for SessionManager {}

impl SessionManager {
    /// Creates an empty manager with no identity loaded.
    #[must_use]
    pub fn new(config: SessionManagerConfig) -> Self {
        Self {
            config,
            identity: None,
            peers: HashMap::new(),
        }
    }

    /// Loads the identity whose secret keys the manager will use.
    ///
    /// Replaces any previously loaded identity. Existing sessions are kept:
    /// they are keyed by chain state, not by our identity keys.
    pub fn set_identity(&mut self, identity: auth::Identity) {
        self.identity = Some(identity);
    }

    /// Whether an identity (and thus secret key material) is loaded.
    #[must_use]
    pub fn identity_loaded(&self) -> bool {
        self.identity.is_some()
    }

    /// Our own user id, if an identity is loaded.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.identity.as_ref().map(auth::Identity::user_id)
    }

    /// Initiates (or confirms) a session with a peer.
    ///
    /// Returns announcement bytes for external broadcast.
    ///
    /// - No session, a Pending session, or a Closed session: a fresh
    ///   Pending (Initiated) session replaces whatever was there, keyed by
    ///   a fresh bootstrap secret.
    /// - An Active session: the session is left untouched and the returned
    ///   announcement is a reciprocal confirmation, letting a peer who
    ///   initiated to us promote their side.
    ///
    /// `user_data` is sealed into the announcement for the recipient only;
    /// typical use is a short contact request note.
    pub fn establish_outgoing_session(
        &mut self,
        peer_pk: &auth::UserPublicKeys,
        user_data: Vec<u8>,
    ) -> Result<Vec<u8>, SessionError> {
        let identity = self
            .identity
            .as_ref()
            .ok_or(SessionError::IdentityUnavailable)?;

        let peer_id = peer_pk.derive_id();
        if peer_id == identity.user_id() {
            return Err(SessionError::SelfPeer);
        }

        // reciprocal confirmation for an already-active session
        if let Some(peer_state) = self.peers.get(&peer_id) {
            if peer_state.session.phase == SessionPhase::Active {
                let (announcement_bytes, _confirmation) = OutgoingInitiationRequest::new(
                    &identity.public_keys,
                    &identity.secret_keys,
                    peer_pk,
                    user_data,
                    Some(peer_state.session.bootstrap_id),
                );
                return Ok(announcement_bytes);
            }
        }

        // fresh initiation; replaces a Pending or Closed session
        let (announcement_bytes, outgoing) = OutgoingInitiationRequest::new(
            &identity.public_keys,
            &identity.secret_keys,
            peer_pk,
            user_data,
            None,
        );
        let session = Session::from_initiated(&outgoing, peer_pk.clone());
        match self.peers.entry(peer_id) {
            Entry::Occupied(mut entry) => entry.get_mut().session = session,
            Entry::Vacant(entry) => {
                entry.insert(Box::new(PeerState {
                    session,
                    last_announcement_timestamp: 0,
                }));
            }
        }

        Ok(announcement_bytes)
    }

    /// Feeds an announcement fetched from the announcement board.
    ///
    /// Returns `Ok(None)` for announcements that are not for us, malformed,
    /// outside the freshness window, or replays of something older than
    /// what we already processed — all expected outcomes on a public feed.
    ///
    /// On success the peer table is updated:
    /// - unknown peer: a new session is created, Active immediately
    ///   (direction Received) — one announcement is enough to reply;
    /// - our Pending initiation + the peer's confirmation: promoted to
    ///   Active with unchanged chains;
    /// - our Pending initiation + the peer's own fresh initiation (crossed):
    ///   promoted to Active with chains derived from both secrets;
    /// - Active session + strictly newer fresh initiation: re-keyed;
    /// - the same announcement again: idempotent success, no state change.
    pub fn feed_incoming_announcement(
        &mut self,
        announcement_bytes: &[u8],
    ) -> Result<Option<AnnouncementResult>, SessionError> {
        let identity = self
            .identity
            .as_ref()
            .ok_or(SessionError::IdentityUnavailable)?;

        let Some((incoming, user_data)) = IncomingInitiationRequest::try_from(
            announcement_bytes,
            &identity.public_keys,
            &identity.secret_keys,
        ) else {
            return Ok(None);
        };

        // freshness window
        let now = timestamp_millis();
        if incoming.timestamp_millis
            < now.saturating_sub(self.config.max_incoming_announcement_age_millis)
        {
            return Ok(None);
        }
        if incoming.timestamp_millis
            > now.saturating_add(self.config.max_incoming_announcement_future_millis)
        {
            return Ok(None);
        }

        let peer_id = incoming.origin_public_keys.derive_id();
        if Some(&peer_id) == self.user_id().as_ref() {
            return Ok(None);
        }

        let result = AnnouncementResult {
            announcer_public_keys: incoming.origin_public_keys.clone(),
            timestamp_millis: incoming.timestamp_millis,
            user_data,
        };

        let peer_state = match self.peers.entry(peer_id.clone()) {
            Entry::Vacant(entry) => {
                // first contact from this peer
                entry.insert(Box::new(PeerState {
                    session: Session::from_received(&incoming),
                    last_announcement_timestamp: incoming.timestamp_millis,
                }));
                return Ok(Some(result));
            }
            Entry::Occupied(entry) => entry.into_mut(),
        };

        // replay of the announcement that keyed the current session
        if incoming.bootstrap_id == peer_state.session.bootstrap_id {
            return Ok(Some(result));
        }

        // confirmation of an initiation we sent
        if incoming.in_reply_to == Some(peer_state.session.bootstrap_id) {
            match peer_state.session.phase {
                SessionPhase::Pending => {
                    peer_state.session.promote_confirmed();
                    peer_state.last_announcement_timestamp = incoming.timestamp_millis;
                    return Ok(Some(result));
                }
                // already confirmed through another path
                SessionPhase::Active => return Ok(Some(result)),
                SessionPhase::Closed => return Ok(None),
            }
        }

        // a fresh initiation must be newer than the latest one we consumed
        if incoming.timestamp_millis <= peer_state.last_announcement_timestamp {
            return Ok(None);
        }

        match peer_state.session.phase {
            SessionPhase::Pending => {
                // both sides initiated independently
                if !peer_state.session.promote_crossed(&incoming) {
                    peer_state.session = Session::from_received(&incoming);
                }
            }
            SessionPhase::Active => {
                tracing::debug!(peer = %peer_id, "re-keying session from fresh announcement");
                peer_state.session = Session::from_received(&incoming);
            }
            SessionPhase::Closed => {
                peer_state.session = Session::from_received(&incoming);
            }
        }
        peer_state.last_announcement_timestamp = incoming.timestamp_millis;

        Ok(Some(result))
    }

    /// The seekers to poll on the message board.
    ///
    /// Covers every session able to receive: Active ones, plus Pending
    /// initiations whose responder chain went live when the peer opened our
    /// announcement. Bounded to `seeker_lookahead` entries per peer.
    #[must_use]
    pub fn get_message_board_read_keys(&self) -> Vec<Vec<u8>> {
        let mut seekers = Vec::new();
        for peer_state in self.peers.values() {
            if peer_state.session.can_receive() {
                seekers.extend(
                    peer_state
                        .session
                        .expected_seekers(self.config.seeker_lookahead),
                );
            }
        }
        seekers
    }

    /// Feeds one `(seeker, data)` pair fetched from the message board.
    ///
    /// Returns `None` when no session claims the seeker, when decryption or
    /// validation fails, or when the message falls outside the timestamp
    /// window — none of which disturb any session's ratchet state. Most
    /// board traffic belongs to other users; `None` is the normal case.
    ///
    /// A successful receive on a Pending initiated session is proof the
    /// peer holds our announcement, and promotes the session to Active.
    pub fn feed_incoming_message_board_read(
        &mut self,
        seeker: &[u8],
        data: &[u8],
    ) -> Option<FeedIncomingMessageOutput> {
        let lookahead = self.config.seeker_lookahead;

        // locate the session watching this seeker
        let peer_id = self.peers.iter().find_map(|(id, peer_state)| {
            (peer_state.session.can_receive()
                && peer_state
                    .session
                    .expected_seekers(lookahead)
                    .iter()
                    .any(|candidate| candidate.as_slice() == seeker))
            .then(|| id.clone())
        })?;

        let peer_state = self.peers.get_mut(&peer_id)?;
        let msg = peer_state
            .session
            .try_feed_incoming_message(seeker, data, lookahead)?;

        // timestamp window; the ratchet has advanced past this message
        // either way, so a replay cannot resurface it
        let now = timestamp_millis();
        if msg.timestamp < now.saturating_sub(self.config.max_incoming_message_age_millis) {
            return None;
        }
        if msg.timestamp > now.saturating_add(self.config.max_incoming_message_future_millis) {
            return None;
        }

        // per-session timestamp monotonicity
        if msg.timestamp < peer_state.session.last_incoming_message_timestamp {
            return None;
        }
        peer_state.session.last_incoming_message_timestamp = msg.timestamp;

        if peer_state.session.phase == SessionPhase::Pending
            && peer_state.session.direction == SessionDirection::Initiated
        {
            peer_state.session.promote_confirmed();
        }

        Some(msg)
    }

    /// Sends a message to a peer through their Active session.
    ///
    /// Returns the `(seeker, data)` pair to post on the message board.
    pub fn send_message(
        &mut self,
        peer_id: &UserId,
        message: &[u8],
    ) -> Result<SendOutgoingMessageOutput, SessionError> {
        let our_id = self
            .identity
            .as_ref()
            .map(auth::Identity::user_id)
            .ok_or(SessionError::IdentityUnavailable)?;

        let peer_state = self.peers.get_mut(peer_id).ok_or(SessionError::UnknownPeer)?;

        match peer_state.session.phase {
            SessionPhase::Pending => return Err(SessionError::SessionNotActive),
            SessionPhase::Closed => return Err(SessionError::SessionClosed),
            SessionPhase::Active => {}
        }

        if peer_state.session.lag_length() >= self.config.max_session_lag_length {
            return Err(SessionError::SessionSaturated);
        }

        match peer_state.session.send_outgoing_message(our_id, message) {
            Some(output) => Ok(output),
            None => {
                // index space exhausted: this session is done for, others
                // are unaffected
                peer_state.session.advance_phase(SessionPhase::Closed);
                Err(SessionError::RatchetExhausted)
            }
        }
    }

    /// The status of a peer's session.
    #[must_use]
    pub fn peer_session_status(&self, peer_id: &UserId) -> SessionStatus {
        match self.peers.get(peer_id) {
            None => SessionStatus::UnknownPeer,
            Some(peer_state) => match peer_state.session.phase {
                SessionPhase::Pending => SessionStatus::Pending,
                SessionPhase::Active => SessionStatus::Active,
                SessionPhase::Closed => SessionStatus::Closed,
            },
        }
    }

    /// All peers currently in the table, in no particular order.
    #[must_use]
    pub fn peer_list(&self) -> Vec<UserId> {
        self.peers.keys().cloned().collect()
    }

    /// Erases a peer and its session state entirely.
    ///
    /// This is the only way session state is ever destroyed. Subsequent
    /// operations on this peer report [`SessionStatus::UnknownPeer`].
    pub fn peer_discard(&mut self, peer_id: &UserId) {
        self.peers.remove(peer_id);
    }

    /// Peers whose Active session has not sent anything for longer than the
    /// keep-alive interval. Pure inspection: whether to actually send a
    /// keep-alive (typically an empty message) is the caller's decision.
    #[must_use]
    pub fn refresh(&self) -> Vec<UserId> {
        let keep_alive_cutoff =
            timestamp_millis().saturating_sub(self.config.keep_alive_interval_millis);
        self.peers
            .iter()
            .filter(|(_, peer_state)| {
                peer_state.session.phase == SessionPhase::Active
                    && peer_state.session.last_outgoing_message_timestamp < keep_alive_cutoff
            })
            .map(|(peer_id, _)| peer_id.clone())
            .collect()
    }

    /// Serializes and encrypts the full manager state.
    ///
    /// Blob layout: `[nonce (12 bytes) || ciphertext || tag]` under
    /// AES-256-GCM with the caller-supplied key. Secret key material never
    /// leaves the manager in any other form.
    #[must_use]
    pub fn to_encrypted_blob(&self, key: &crypto_aead::Key) -> Option<Vec<u8>> {
        let nonce = {
            let mut nonce_bytes = [0u8; crypto_aead::NONCE_SIZE];
            crypto_rng::fill_buffer(&mut nonce_bytes);
            crypto_aead::Nonce::from(nonce_bytes)
        };

        let serialized_blob =
            Zeroizing::new(bincode::serde::encode_to_vec(self, bincode::config::standard()).ok()?);

        let encrypted_blob =
            Zeroizing::new(crypto_aead::encrypt(key, &nonce, &serialized_blob, b""));

        Some([nonce.as_bytes().as_slice(), &encrypted_blob].concat())
    }

    /// Restores a manager from a blob produced by
    /// [`to_encrypted_blob`](Self::to_encrypted_blob).
    ///
    /// Returns `None` on a short blob, wrong key, or corrupted data. The
    /// restored manager fully replaces whatever the caller held before;
    /// there is no partial merge.
    #[must_use]
    pub fn from_encrypted_blob(encrypted_blob: &[u8], key: &crypto_aead::Key) -> Option<Self> {
        let nonce = {
            let nonce_bytes: [u8; crypto_aead::NONCE_SIZE] = encrypted_blob
                .get(..crypto_aead::NONCE_SIZE)?
                .try_into()
                .ok()?;
            crypto_aead::Nonce::from(nonce_bytes)
        };

        let ciphertext = encrypted_blob.get(crypto_aead::NONCE_SIZE..)?;
        let decrypted_blob = Zeroizing::new(crypto_aead::decrypt(key, &nonce, ciphertext, b"")?);

        let session_manager: Self =
            bincode::serde::decode_from_slice(&decrypted_blob, bincode::config::standard())
                .ok()?
                .0;

        Some(session_manager)
    }
}

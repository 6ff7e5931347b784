//! Sessions crate
//!
//! This crate is the session protocol engine of the Quill messenger: it
//! establishes pairwise encrypted sessions over a passive message board,
//! ratchets key material forward on every message, and hands the caller
//! everything it needs to poll, post, and persist — without ever performing
//! I/O itself.
//!
//! # Overview
//!
//! Peers discover each other through *announcements*: self-authenticating
//! envelopes broadcast on a public board, sealed so that only the intended
//! recipient can open them. Opening an announcement bootstraps a session
//! whose messages are addressed by *seekers* — opaque per-message lookup
//! tokens derived from the session's forward key chains. An observer of the
//! board sees only `(seeker, ciphertext)` pairs with no sender, recipient,
//! or ordering information.
//!
//! Key properties:
//! - **Post-quantum bootstrap**: announcements use ML-KEM-768 sealing and
//!   ML-DSA-65 signatures.
//! - **Forward secrecy**: per-message keys are hash-chain derived and
//!   dropped after use; state compromise never exposes past traffic.
//! - **At-most-once delivery**: a consumed `(seeker, ciphertext)` pair can
//!   never decrypt again; replays are silent non-matches.
//! - **Gap tolerance**: a bounded seeker window lets the receive side jump
//!   past messages lost before ever reaching the board.
//! - **Single opaque persistence blob**: the whole manager state round-trips
//!   through one encrypted buffer held by the external store.
//!
//! # Architecture
//!
//! ```text
//!                        SessionManager
//!                   (identity, config, peers)
//!                              |
//!               +--------------+--------------+
//!               |                             |
//!        PeerState (Alice)             PeerState (Bob)
//!               |                             |
//!            Session                       Session
//!       (phase, direction)           (phase, direction)
//!               |                             |
//!            Cascade                       Cascade
//!      (send/recv key chains)       (send/recv key chains)
//! ```
//!
//! - **SessionManager**: owns all mutable state, routes announcements and
//!   board reads, enforces status invariants ([`SessionManager`]).
//! - **Session**: one peer's lifecycle phase, direction, and ratchet.
//! - **Cascade** (from `crypto-cascade`): the forward key chains and the
//!   acknowledgment ledger.
//!
//! # Usage
//!
//! ```rust,no_run
//! use sessions::{SessionManager, SessionManagerConfig, SessionStatus};
//!
//! # fn fetch_new_announcements() -> Vec<Vec<u8>> { vec![] }
//! # fn board_read(_: &[u8]) -> Option<Vec<u8>> { None }
//! # fn board_write(_: &[u8], _: &[u8]) {}
//! # fn board_release(_: &[u8]) {}
//! # fn broadcast(_: &[u8]) {}
//! # fn get_peer_public_keys() -> auth::UserPublicKeys { todo!() }
//! // Derive an identity from caller-provided seed entropy
//! let root_seed = auth::RootSeed::from_entropy(b"seed material from mnemonic", b"quill").unwrap();
//! let identity = auth::Identity::from_root_seed(&root_seed);
//!
//! let mut manager = SessionManager::new(SessionManagerConfig::default());
//! manager.set_identity(identity);
//!
//! // Initiate a session with a peer
//! let peer_pk = get_peer_public_keys();
//! let announcement = manager
//!     .establish_outgoing_session(&peer_pk, b"contact request".to_vec())
//!     .unwrap();
//! broadcast(&announcement);
//!
//! // Main event loop, driven by the caller
//! loop {
//!     // 1. Process announcements fetched from the announcement board
//!     for bytes in fetch_new_announcements() {
//!         if let Ok(Some(result)) = manager.feed_incoming_announcement(&bytes) {
//!             println!("announcement from {}", result.announcer_public_keys.derive_id());
//!         }
//!     }
//!
//!     // 2. Poll the message board for the seekers we are watching
//!     for seeker in manager.get_message_board_read_keys() {
//!         if let Some(data) = board_read(&seeker) {
//!             if let Some(msg) = manager.feed_incoming_message_board_read(&seeker, &data) {
//!                 println!("message: {:?}", String::from_utf8_lossy(&msg.message));
//!                 for acked in &msg.newly_acknowledged_self_seekers {
//!                     board_release(acked);
//!                 }
//!             }
//!         }
//!     }
//!
//!     // 3. Send queued outgoing messages
//!     let peer_id = peer_pk.derive_id();
//!     if manager.peer_session_status(&peer_id) == SessionStatus::Active {
//!         if let Ok(output) = manager.send_message(&peer_id, b"hello") {
//!             board_write(&output.seeker, &output.data);
//!         }
//!     }
//!
//!     // 4. Keep quiet sessions visible on the board
//!     for peer_id in manager.refresh() {
//!         if let Ok(output) = manager.send_message(&peer_id, b"") {
//!             board_write(&output.seeker, &output.data);
//!         }
//!     }
//! #   break;
//! }
//! ```
//!
//! # Session lifecycle
//!
//! 1. **Initiation**: `establish_outgoing_session` creates a Pending
//!    session and returns announcement bytes for broadcast.
//! 2. **Activation**: the receiving side is Active as soon as it opens the
//!    announcement; the initiating side is promoted when the peer confirms
//!    (reciprocal announcement, crossed initiation, or first message).
//! 3. **Messaging**: `send_message` / `feed_incoming_message_board_read`.
//! 4. **Keep-alive**: `refresh` reports quiet sessions; the caller decides
//!    whether to send empty messages.
//! 5. **Termination**: only `peer_discard` destroys session state. Fatal
//!    ratchet errors close a session in place, where its status remains
//!    observable until discarded.

mod session;
mod session_manager;
mod utils;

pub use session::{FeedIncomingMessageOutput, SendOutgoingMessageOutput};
pub use session_manager::{
    AnnouncementResult, SessionError, SessionManager, SessionManagerConfig, SessionStatus,
};

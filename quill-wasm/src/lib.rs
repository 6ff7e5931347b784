//! Quill WASM API
//!
//! WebAssembly bindings for the Quill session protocol engine, exposing the
//! SessionManager and identity facilities to JavaScript/TypeScript hosts.
//!
//! Every fallible operation returns a `Result` whose error is a plain
//! string `JsValue`; expected non-matches (foreign announcements, unknown
//! seekers) come back as `undefined` rather than errors, so host code can
//! scan public feeds without exception handling.

use wasm_bindgen::prelude::*;

// Set up panic hook for better error messages in the browser
#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
}

fn js_err(error: sessions::SessionError) -> JsValue {
    JsValue::from_str(&error.to_string())
}

/// Session manager configuration for controlling session behavior.
#[wasm_bindgen]
pub struct SessionConfig {
    inner: sessions::SessionManagerConfig,
}

#[wasm_bindgen]
impl SessionConfig {
    /// Creates a new session configuration with the given parameters.
    #[wasm_bindgen(constructor)]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        max_incoming_announcement_age_millis: f64,
        max_incoming_announcement_future_millis: f64,
        max_incoming_message_age_millis: f64,
        max_incoming_message_future_millis: f64,
        keep_alive_interval_millis: f64,
        max_session_lag_length: u64,
        seeker_lookahead: u64,
    ) -> Self {
        Self {
            inner: sessions::SessionManagerConfig {
                max_incoming_announcement_age_millis: max_incoming_announcement_age_millis as u128,
                max_incoming_announcement_future_millis: max_incoming_announcement_future_millis
                    as u128,
                max_incoming_message_age_millis: max_incoming_message_age_millis as u128,
                max_incoming_message_future_millis: max_incoming_message_future_millis as u128,
                keep_alive_interval_millis: keep_alive_interval_millis as u128,
                max_session_lag_length,
                seeker_lookahead,
            },
        }
    }

    /// Creates a configuration with the library defaults.
    pub fn new_default() -> Self {
        Self {
            inner: sessions::SessionManagerConfig::default(),
        }
    }
}

/// User public keys for session establishment and user identification.
#[wasm_bindgen]
pub struct UserPublicKeys {
    inner: auth::UserPublicKeys,
}

#[wasm_bindgen]
impl UserPublicKeys {
    /// Derives the 32-byte user ID from the public keys.
    pub fn derive_id(&self) -> Vec<u8> {
        self.inner.derive_id().as_bytes().to_vec()
    }

    /// Derives the user ID in its checksummed display encoding.
    pub fn derive_id_base58check(&self) -> String {
        self.inner.derive_id().to_base58check()
    }

    /// Serializes the public keys to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.inner.to_bytes()
    }

    /// Deserializes public keys from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<UserPublicKeys, JsValue> {
        auth::UserPublicKeys::from_bytes(bytes)
            .map(|inner| UserPublicKeys { inner })
            .ok_or_else(|| JsValue::from_str("invalid public key encoding"))
    }
}

/// A full identity (public and secret keys) derived from seed entropy.
#[wasm_bindgen]
pub struct Identity {
    inner: auth::Identity,
}

#[wasm_bindgen]
impl Identity {
    /// Derives an identity from seed bytes and a domain-separation tag.
    ///
    /// Deterministic: the same seed and tag always reproduce the same
    /// identity. Fails if the seed is shorter than 16 bytes.
    pub fn from_seed(seed: &[u8], domain_tag: &[u8]) -> Result<Identity, JsValue> {
        let root_seed = auth::RootSeed::from_entropy(seed, domain_tag)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(Identity {
            inner: auth::Identity::from_root_seed(&root_seed),
        })
    }

    /// The identity's public keys.
    pub fn public_keys(&self) -> UserPublicKeys {
        UserPublicKeys {
            inner: self.inner.public_keys.clone(),
        }
    }

    /// The identity's 32-byte user ID.
    pub fn user_id(&self) -> Vec<u8> {
        self.inner.user_id().as_bytes().to_vec()
    }
}

/// Encodes a raw 32-byte user ID for display (Base58Check).
#[wasm_bindgen]
pub fn encode_user_id(user_id: &[u8]) -> Result<String, JsValue> {
    auth::UserId::from_bytes(user_id)
        .map(|id| id.to_base58check())
        .ok_or_else(|| JsValue::from_str("user id must be 32 bytes"))
}

/// Decodes a Base58Check user ID back to its raw 32 bytes.
#[wasm_bindgen]
pub fn decode_user_id(encoded: &str) -> Result<Vec<u8>, JsValue> {
    auth::UserId::from_base58check(encoded)
        .map(|id| id.as_bytes().to_vec())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Output of sending a message: post `data` on the board under `seeker`.
#[wasm_bindgen]
pub struct SendMessageOutput {
    timestamp: f64,
    seeker: Vec<u8>,
    data: Vec<u8>,
}

#[wasm_bindgen]
impl SendMessageOutput {
    #[wasm_bindgen(getter)]
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    #[wasm_bindgen(getter)]
    pub fn seeker(&self) -> Vec<u8> {
        self.seeker.clone()
    }

    #[wasm_bindgen(getter)]
    pub fn data(&self) -> Vec<u8> {
        self.data.clone()
    }
}

/// Output of a successfully decrypted board read.
#[wasm_bindgen]
pub struct ReceivedMessage {
    timestamp: f64,
    message: Vec<u8>,
    user_id: Vec<u8>,
    acknowledged_seekers: Vec<u8>,
    acknowledged_seeker_count: u32,
}

#[wasm_bindgen]
impl ReceivedMessage {
    #[wasm_bindgen(getter)]
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    #[wasm_bindgen(getter)]
    pub fn message(&self) -> Vec<u8> {
        self.message.clone()
    }

    /// Raw 32-byte user ID of the sender.
    #[wasm_bindgen(getter)]
    pub fn user_id(&self) -> Vec<u8> {
        self.user_id.clone()
    }

    /// Seekers of our own messages the peer confirmed, concatenated as
    /// 32-byte chunks; their board slots can be released.
    #[wasm_bindgen(getter)]
    pub fn acknowledged_seekers(&self) -> Vec<u8> {
        self.acknowledged_seekers.clone()
    }

    #[wasm_bindgen(getter)]
    pub fn acknowledged_seeker_count(&self) -> u32 {
        self.acknowledged_seeker_count
    }
}

/// Result of processing an incoming announcement.
#[wasm_bindgen]
pub struct AnnouncementOutcome {
    announcer_public_keys: auth::UserPublicKeys,
    timestamp: f64,
    user_data: Vec<u8>,
}

#[wasm_bindgen]
impl AnnouncementOutcome {
    pub fn announcer_public_keys(&self) -> UserPublicKeys {
        UserPublicKeys {
            inner: self.announcer_public_keys.clone(),
        }
    }

    #[wasm_bindgen(getter)]
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    #[wasm_bindgen(getter)]
    pub fn user_data(&self) -> Vec<u8> {
        self.user_data.clone()
    }
}

/// The session protocol engine's top-level object.
#[wasm_bindgen]
pub struct SessionManager {
    inner: sessions::SessionManager,
}

#[wasm_bindgen]
impl SessionManager {
    /// Creates an empty manager; load an identity before establishing
    /// sessions.
    #[wasm_bindgen(constructor)]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            inner: sessions::SessionManager::new(config.inner),
        }
    }

    /// Loads the identity whose keys the manager will use.
    pub fn set_identity(&mut self, identity: &Identity) {
        self.inner.set_identity(identity.inner.clone());
    }

    /// Whether an identity is loaded.
    pub fn identity_loaded(&self) -> bool {
        self.inner.identity_loaded()
    }

    /// Initiates (or confirms) a session with a peer; returns announcement
    /// bytes to broadcast.
    pub fn establish_outgoing_session(
        &mut self,
        peer_public_keys: &UserPublicKeys,
        user_data: &[u8],
    ) -> Result<Vec<u8>, JsValue> {
        self.inner
            .establish_outgoing_session(&peer_public_keys.inner, user_data.to_vec())
            .map_err(js_err)
    }

    /// Feeds an announcement fetched from the announcement board.
    ///
    /// Returns `undefined` for announcements that are not for us.
    pub fn feed_incoming_announcement(
        &mut self,
        announcement_bytes: &[u8],
    ) -> Result<Option<AnnouncementOutcome>, JsValue> {
        let result = self
            .inner
            .feed_incoming_announcement(announcement_bytes)
            .map_err(js_err)?;
        Ok(result.map(|r| AnnouncementOutcome {
            announcer_public_keys: r.announcer_public_keys.clone(),
            timestamp: r.timestamp_millis as f64,
            user_data: r.user_data.clone(),
        }))
    }

    /// The seekers to poll on the message board, concatenated as 32-byte
    /// chunks.
    pub fn get_message_board_read_keys(&self) -> Vec<u8> {
        self.inner.get_message_board_read_keys().concat()
    }

    /// Feeds one `(seeker, data)` pair fetched from the message board.
    ///
    /// Returns `undefined` when the entry does not decrypt to a message for
    /// us — the normal case for most board traffic.
    pub fn feed_incoming_message_board_read(
        &mut self,
        seeker: &[u8],
        data: &[u8],
    ) -> Option<ReceivedMessage> {
        let msg = self.inner.feed_incoming_message_board_read(seeker, data)?;
        Some(ReceivedMessage {
            timestamp: msg.timestamp as f64,
            message: msg.message.clone(),
            user_id: msg.user_id.as_bytes().to_vec(),
            acknowledged_seeker_count: msg.newly_acknowledged_self_seekers.len() as u32,
            acknowledged_seekers: msg.newly_acknowledged_self_seekers.concat(),
        })
    }

    /// Sends a message to a peer (by raw 32-byte user ID).
    pub fn send_message(
        &mut self,
        peer_id: &[u8],
        message: &[u8],
    ) -> Result<SendMessageOutput, JsValue> {
        let peer_id = auth::UserId::from_bytes(peer_id)
            .ok_or_else(|| JsValue::from_str("peer id must be 32 bytes"))?;
        let output = self.inner.send_message(&peer_id, message).map_err(js_err)?;
        Ok(SendMessageOutput {
            timestamp: output.timestamp as f64,
            seeker: output.seeker.clone(),
            data: output.data.clone(),
        })
    }

    /// The session status for a peer: "pending", "active", "closed", or
    /// "unknown".
    pub fn peer_session_status(&self, peer_id: &[u8]) -> Result<String, JsValue> {
        let peer_id = auth::UserId::from_bytes(peer_id)
            .ok_or_else(|| JsValue::from_str("peer id must be 32 bytes"))?;
        let status = match self.inner.peer_session_status(&peer_id) {
            sessions::SessionStatus::Pending => "pending",
            sessions::SessionStatus::Active => "active",
            sessions::SessionStatus::Closed => "closed",
            sessions::SessionStatus::UnknownPeer => "unknown",
        };
        Ok(status.to_string())
    }

    /// All known peer IDs, concatenated as 32-byte chunks.
    pub fn peer_list(&self) -> Vec<u8> {
        self.inner
            .peer_list()
            .iter()
            .flat_map(|id| id.as_bytes().to_vec())
            .collect()
    }

    /// Erases a peer and its session state.
    pub fn peer_discard(&mut self, peer_id: &[u8]) -> Result<(), JsValue> {
        let peer_id = auth::UserId::from_bytes(peer_id)
            .ok_or_else(|| JsValue::from_str("peer id must be 32 bytes"))?;
        self.inner.peer_discard(&peer_id);
        Ok(())
    }

    /// Peer IDs (32-byte chunks) whose sessions need a keep-alive message.
    pub fn refresh(&self) -> Vec<u8> {
        self.inner
            .refresh()
            .iter()
            .flat_map(|id| id.as_bytes().to_vec())
            .collect()
    }

    /// Serializes and encrypts the whole manager under a 32-byte key.
    pub fn to_encrypted_blob(&self, key: &[u8]) -> Result<Vec<u8>, JsValue> {
        let key_bytes: [u8; crypto_aead::KEY_SIZE] = key
            .try_into()
            .map_err(|_| JsValue::from_str("wrapping key must be 32 bytes"))?;
        self.inner
            .to_encrypted_blob(&crypto_aead::Key::from(key_bytes))
            .ok_or_else(|| JsValue::from_str("state serialization failed"))
    }

    /// Restores a manager from an encrypted blob.
    pub fn from_encrypted_blob(blob: &[u8], key: &[u8]) -> Result<SessionManager, JsValue> {
        let key_bytes: [u8; crypto_aead::KEY_SIZE] = key
            .try_into()
            .map_err(|_| JsValue::from_str("wrapping key must be 32 bytes"))?;
        sessions::SessionManager::from_encrypted_blob(blob, &crypto_aead::Key::from(key_bytes))
            .map(|inner| SessionManager { inner })
            .ok_or_else(|| JsValue::from_str("could not decrypt session state"))
    }
}

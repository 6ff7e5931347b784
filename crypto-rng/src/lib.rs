//! Secure random number generation.
//!
//! Thin wrapper around the operating system's entropy source. On wasm32 the
//! `js` backend of `getrandom` routes through `crypto.getRandomValues`.

/// Fills the buffer with cryptographically secure random bytes.
///
/// # Panics
///
/// Panics if the platform entropy source is unavailable. Every supported
/// target provides one; running without entropy would silently void all
/// security guarantees, so this is not a recoverable condition.
pub fn fill_buffer(buffer: &mut [u8]) {
    getrandom::getrandom(buffer).expect("OS entropy source unavailable");
}

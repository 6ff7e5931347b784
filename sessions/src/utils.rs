//! Small shared helpers.

/// Current wall-clock time in milliseconds since the Unix epoch.
#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn timestamp_millis() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_millis()
}

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// `SystemTime::now` is unavailable on wasm32-unknown-unknown; use the
/// host's `Date.now()` instead.
#[cfg(target_arch = "wasm32")]
pub(crate) fn timestamp_millis() -> u128 {
    js_sys::Date::now() as u128
}

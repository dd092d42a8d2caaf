// Clinic API - Cursor Codec
// Opaque pagination tokens: URL-safe base64 over a small JSON state object.
// Each listing endpoint owns its state shape; clients never parse tokens.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encode a cursor state into an opaque URL-safe token.
pub fn encode<T: Serialize>(state: &T) -> String {
    match serde_json::to_vec(state) {
        Ok(bytes) => URL_SAFE.encode(bytes),
        // Unreachable for the plain field structs used as cursor states.
        Err(_) => String::new(),
    }
}

/// Decode a token back into a cursor state.
///
/// Fails soft: malformed, truncated, or non-conforming tokens yield `None`,
/// which callers treat the same as "no cursor provided".
pub fn decode<T: DeserializeOwned>(token: &str) -> Option<T> {
    let bytes = URL_SAFE.decode(token.as_bytes()).ok()?;
    serde_json::from_slice(&bytes).ok()
}

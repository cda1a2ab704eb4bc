//! Payload codec for flip storage.
//!
//! Flip payloads ride inside the persisted edge state, so they are kept
//! small: JSON-encode, zstd-compress at the fastest level, then
//! base64url-encode without padding. The compression choice is not
//! observable outside this module; it only needs to stay stable within a
//! deployment.
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::Value;
use thiserror::Error;

// zstd level 1 trades ratio for speed on the hot path.
const ZSTD_LEVEL: i32 = 1;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("payload encode: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload decode: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("payload compression: {0}")]
    Compression(#[from] std::io::Error),
}

/// JSON-encode, compress, and base64url-encode a payload.
pub fn encode(payload: &Value) -> Result<String, CodecError> {
    let json = serde_json::to_vec(payload)?;
    let compressed = zstd::stream::encode_all(json.as_slice(), ZSTD_LEVEL)?;
    Ok(URL_SAFE_NO_PAD.encode(compressed))
}

/// Inverse of [`encode`], returning the raw JSON bytes. Tolerates encoders
/// that emitted padding.
pub fn decode(encoded: &str) -> Result<Vec<u8>, CodecError> {
    let compressed = URL_SAFE_NO_PAD.decode(encoded.trim_end_matches('='))?;
    Ok(zstd::stream::decode_all(compressed.as_slice())?)
}

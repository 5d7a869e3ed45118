//! Catalog blob codec
//!
//! Catalog payloads are shipped obfuscated so a casual look at the network
//! tab does not reveal the plain catalog. This is NOT encryption: anyone with
//! this module can decode a blob. The transform is
//! base64 -> fixed character substitution -> reversal -> version tag.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Tag prepended to every encoded blob.
pub const VERSION_PREFIX: &str = "WG1.";

/// Payloads longer than this are decoded on the blocking pool.
pub const OFFLOAD_THRESHOLD: usize = 1000;

const PLAIN_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const MAPPED_ALPHABET: &[u8; 64] =
    b"pkceEK+8jbCiYudR9ISqnNoZ42g0fGl6hyPAUM1vLF5xWaDHmT/sOBV73wtXJzQr";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("missing version tag")]
    MissingTag,
    #[error("invalid base64 after unmapping: {0}")]
    InvalidBase64(String),
    #[error("decoded bytes are not UTF-8")]
    InvalidUtf8,
}

struct Tables {
    encode: [u8; 256],
    decode: [u8; 256],
}

const fn build_tables() -> Tables {
    let mut encode = [0u8; 256];
    let mut decode = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        encode[i] = i as u8;
        decode[i] = i as u8;
        i += 1;
    }
    let mut j = 0;
    while j < 64 {
        encode[PLAIN_ALPHABET[j] as usize] = MAPPED_ALPHABET[j];
        decode[MAPPED_ALPHABET[j] as usize] = PLAIN_ALPHABET[j];
        j += 1;
    }
    Tables { encode, decode }
}

static TABLES: Tables = build_tables();

/// Obfuscate a UTF-8 string.
pub fn encode(plain: &str) -> String {
    let b64 = STANDARD.encode(plain.as_bytes());
    let mut out = String::with_capacity(VERSION_PREFIX.len() + b64.len());
    out.push_str(VERSION_PREFIX);
    // base64 output is pure ASCII, so byte-wise mapping and reversal is safe.
    out.extend(
        b64.bytes()
            .rev()
            .map(|b| TABLES.encode[b as usize] as char),
    );
    out
}

/// Reverse [`encode`].
pub fn decode(cipher: &str) -> Result<String, CodecError> {
    let body = cipher
        .strip_prefix(VERSION_PREFIX)
        .ok_or(CodecError::MissingTag)?;

    let unmapped: Vec<u8> = body
        .bytes()
        .rev()
        .map(|b| TABLES.decode[b as usize])
        .collect();

    let bytes = STANDARD
        .decode(&unmapped)
        .map_err(|e| CodecError::InvalidBase64(e.to_string()))?;

    String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)
}

/// Why a blob could not be turned into a value.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("decoded blob is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode a blob and parse the plain text as JSON.
pub fn decode_json<T: DeserializeOwned>(cipher: &str) -> Result<T, BlobError> {
    let plain = decode(cipher)?;
    Ok(serde_json::from_str(&plain)?)
}

/// Decode a blob, moving large payloads off the async worker threads.
pub async fn decode_json_offloaded<T>(cipher: &str, threshold: usize) -> Result<T, BlobError>
where
    T: DeserializeOwned + Send + 'static,
{
    if cipher.len() > threshold {
        let owned = cipher.to_string();
        match tokio::task::spawn_blocking(move || decode_json::<T>(&owned)).await {
            Ok(result) => return result,
            Err(e) => {
                tracing::warn!(error = %e, "blocking decode failed, decoding inline");
            }
        }
    }
    decode_json(cipher)
}

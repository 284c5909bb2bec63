//! Value codec - text-safe encoding for the durable backend
//!
//! Envelope layout, base64 (standard alphabet) encoded:
//!
//! ```text
//! | "WMS" | version: u8 | blake3(payload): [u8; 32] | payload: bincode(StoredValue) |
//! ```
//!
//! Decoding rejects anything this encoder did not produce, so a corrupted or
//! foreign row reads as an error instead of a garbage value.

use crate::value::StoredValue;
use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bincode::Options;

/// Envelope magic bytes
const MAGIC: &[u8; 3] = b"WMS";
/// Current envelope format version
pub const FORMAT_VERSION: u8 = 1;
/// Checksum length (blake3 digest)
const CHECKSUM_LEN: usize = 32;
/// Header length: magic + version + checksum
const HEADER_LEN: usize = MAGIC.len() + 1 + CHECKSUM_LEN;
/// Upper bound on a single bincode payload
pub const MAX_PAYLOAD_BYTES: u64 = 16 * 1024 * 1024;

fn bincode_options() -> impl Options {
    bincode::DefaultOptions::new().with_limit(MAX_PAYLOAD_BYTES)
}

/// Encode a value into its persisted text form
pub fn encode(value: &StoredValue) -> Result<String> {
    let payload = bincode_options().serialize(value)?;
    let checksum = blake3::hash(&payload);

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.push(FORMAT_VERSION);
    bytes.extend_from_slice(checksum.as_bytes());
    bytes.extend_from_slice(&payload);

    Ok(STANDARD.encode(bytes))
}

/// Decode a persisted text form back into a value
pub fn decode(text: &str) -> Result<StoredValue> {
    let bytes = STANDARD.decode(text.trim())?;
    if bytes.len() < HEADER_LEN {
        return Err(Error::Codec(format!(
            "envelope too short: {} bytes",
            bytes.len()
        )));
    }

    let (magic, rest) = bytes.split_at(MAGIC.len());
    if magic != MAGIC {
        return Err(Error::Codec("missing envelope magic".to_string()));
    }

    let version = rest[0];
    if version != FORMAT_VERSION {
        return Err(Error::Codec(format!(
            "unsupported format version {} (expected {})",
            version, FORMAT_VERSION
        )));
    }

    let (checksum, payload) = rest[1..].split_at(CHECKSUM_LEN);
    if blake3::hash(payload).as_bytes() != checksum {
        return Err(Error::Codec("checksum mismatch".to_string()));
    }

    let value: StoredValue = bincode_options().deserialize(payload)?;
    value.validate()?;
    Ok(value)
}

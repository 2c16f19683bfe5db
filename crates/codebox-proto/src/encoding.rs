//! Field sub-encodings used inside frames.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

pub fn encode_text(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

pub fn decode_bytes(field: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(field.trim())
}

/// Decodes a base64 text field. Invalid UTF-8 is replaced rather than
/// rejected; captured program output is not guaranteed to be well formed.
pub fn decode_text(field: &str) -> Result<String, base64::DecodeError> {
    let bytes = decode_bytes(field)?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    })
}

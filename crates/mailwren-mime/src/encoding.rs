//! Base64 body encoding.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Maximum encoded line length for message bodies (RFC 2045 6.8).
const MAX_LINE_LENGTH: usize = 76;

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64 wrapped at 76 columns, for use as a message
/// part body.
#[must_use]
pub fn encode_base64_wrapped(data: &[u8]) -> String {
    let encoded = encode_base64(data);
    let mut wrapped = String::with_capacity(encoded.len() + encoded.len() / MAX_LINE_LENGTH * 2);
    let mut rest = encoded.as_str();
    while rest.len() > MAX_LINE_LENGTH {
        let (line, tail) = rest.split_at(MAX_LINE_LENGTH);
        wrapped.push_str(line);
        wrapped.push_str("\r\n");
        rest = tail;
    }
    wrapped.push_str(rest);
    wrapped
}

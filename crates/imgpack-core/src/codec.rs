//! Reversible filename encoding for transport.
//!
//! Browsers percent-encode non-ASCII filenames in multipart bodies, so the
//! name read off the wire is decoded before it touches the disk and encoded
//! again whenever it has to travel back inside a header.  Both directions are
//! soft: a malformed input is logged and handed back unchanged.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::warn;

/// Everything except the `encodeURIComponent` unreserved set is escaped.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Reverse percent-encoding.  Returns `name` unchanged when it holds a broken
/// `%XX` escape or decodes to invalid UTF-8.
pub fn decode(name: &str) -> String {
    if let Some(at) = first_bad_escape(name) {
        warn!(name, offset = at, "filename decoding failed: malformed escape");
        return name.to_owned();
    }
    match percent_decode_str(name).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(e) => {
            warn!(name, error = %e, "filename decoding failed");
            name.to_owned()
        }
    }
}

/// Percent-encode `name` so it survives transport in a URL or header.
pub fn encode(name: &str) -> String {
    utf8_percent_encode(name, COMPONENT).to_string()
}

/// Byte offset of the first `%` that is not followed by two hex digits.
fn first_bad_escape(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    bytes.iter().enumerate().find_map(|(i, &b)| {
        if b != b'%' {
            return None;
        }
        let well_formed = bytes
            .get(i + 1..i + 3)
            .is_some_and(|pair| pair.iter().all(u8::is_ascii_hexdigit));
        (!well_formed).then_some(i)
    })
}

//! RFC 3986 percent-encoding as OAuth requires it.
//!
//! Only the unreserved set `A-Z a-z 0-9 - . _ ~` passes through; every other
//! UTF-8 byte becomes `%XX`. Servers differ in which hex case they accept,
//! so the case is selectable.

use serde::{Deserialize, Serialize};

use crate::error::PercentDecodeError;

/// Hex digit case used for `%XX` escapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HexCase {
    #[default]
    Upper,
    Lower,
}

const UPPER_HEX: &[u8; 16] = b"0123456789ABCDEF";
const LOWER_HEX: &[u8; 16] = b"0123456789abcdef";

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

/// Percent-encode `value` with the given hex case.
pub fn percent_encode(value: &str, case: HexCase) -> String {
    let digits = match case {
        HexCase::Upper => UPPER_HEX,
        HexCase::Lower => LOWER_HEX,
    };
    let mut out = String::with_capacity(value.len());
    for &b in value.as_bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(digits[(b >> 4) as usize] as char);
            out.push(digits[(b & 0x0f) as usize] as char);
        }
    }
    out
}

/// Decode `%XX` escapes (either case). `+` is left alone, and a `%` not
/// followed by two hex digits is kept literally.
pub fn percent_decode(value: &str) -> Result<String, PercentDecodeError> {
    urlencoding::decode(value)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| PercentDecodeError::InvalidUtf8)
}

//! Percent-encoding with the AWS signing rules
//!
//! Everything outside the unreserved set `[A-Za-z0-9_.~-]` is encoded as
//! `%XX` with uppercase hex, byte by byte over the UTF-8 representation.
//! Space is always `%20`, never `+`.

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// URI-encode a string for canonical requests
///
/// `encode_slash = false` keeps `/` literal (resource paths).
/// `preserve_star = true` keeps `*` literal (form-encoded POST payloads).
pub fn uri_encode(input: &str, encode_slash: bool, preserve_star: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for b in input.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            b'/' if !encode_slash => out.push('/'),
            b'*' if preserve_star => out.push('*'),
            _ => {
                out.push('%');
                out.push(HEX_UPPER[usize::from(b >> 4)] as char);
                out.push(HEX_UPPER[usize::from(b & 0x0f)] as char);
            }
        }
    }
    out
}

/// Decode a `application/x-www-form-urlencoded` component (`+` is a space)
pub fn url_decode(s: &str) -> String {
    decode(s, true)
}

/// Decode a percent-encoded path, leaving `+` alone
pub fn percent_decode(s: &str) -> String {
    decode(s, false)
}

/// Invalid escapes are kept verbatim; invalid UTF-8 is replaced lossily.
fn decode(s: &str, plus_as_space: bool) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi << 4) | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' if plus_as_space => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// Parse a raw query string into decoded `(name, value)` pairs
///
/// A name without `=` maps to an empty value.
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|param| !param.is_empty())
        .map(|param| {
            let (key, value) = param.split_once('=').unwrap_or((param, ""));
            (url_decode(key), url_decode(value))
        })
        .collect()
}

const fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

//! Query-string and urlencoded-form parsing.
//!
//! The same `key=value&key=value` grammar serves both the request query and
//! `application/x-www-form-urlencoded` bodies. Repeated keys keep every value
//! in order; keys without `=` have an empty value.

use std::borrow::Cow;

/// A borrowed view over a raw query string (without the leading `?`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryString<'a> {
    raw: &'a str,
}

impl<'a> QueryString<'a> {
    /// Wrap a raw query string. Parsing is lazy.
    #[must_use]
    pub fn parse(raw: &'a str) -> Self {
        Self { raw }
    }

    /// Returns true if there is nothing to parse.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Raw `(key, value)` pairs, not percent-decoded.
    pub fn pairs(&self) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.raw
            .split('&')
            .filter(|s| !s.is_empty())
            .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
    }

    /// Decoded `(key, value)` pairs.
    pub fn pairs_decoded(&self) -> impl Iterator<Item = (Cow<'a, str>, Cow<'a, str>)> {
        self.pairs()
            .map(|(k, v)| (percent_decode(k), percent_decode(v)))
    }
}

/// Percent-decode a query component; `+` decodes to a space.
///
/// Malformed escapes are kept verbatim and invalid UTF-8 is replaced.
pub fn percent_decode(s: &str) -> Cow<'_, str> {
    decode(s, true)
}

/// Percent-decode a path segment. `+` is literal in paths.
pub fn percent_decode_path(s: &str) -> Cow<'_, str> {
    decode(s, false)
}

fn decode(s: &str, plus_as_space: bool) -> Cow<'_, str> {
    let needs_work = s.contains('%') || (plus_as_space && s.contains('+'));
    if !needs_work {
        return Cow::Borrowed(s);
    }

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
    Cow::Owned(String::from_utf8_lossy(&out).into_owned())
}

/// Percent-encode a query component (the inverse of [`percent_decode`]).
#[must_use]
pub fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(char::from(byte));
            }
            b' ' => out.push('+'),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

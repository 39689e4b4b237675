//! Literal escaping for bound values.
//!
//! Two conventions are in use. SELECT statements go to SimpleDB unchanged, so
//! their literals follow SimpleDB's own rule of doubling single quotes.
//! INSERT, UPDATE and DELETE statements are parsed by this crate, and their
//! literals use a backslash escape table that [`decode`] reverses when the
//! literal is turned back into an attribute value.

/// Escape table for emulated statements, as `(raw char, escape sequence)`.
///
/// 0x1A is escaped to `\Z` but [`decode`] has no entry for it, so the value
/// does not survive a round trip.
pub const WRITE_ESCAPES: [(char, &str); 7] = [
    ('\\', "\\\\"),
    ('\0', "\\0"),
    ('\n', "\\n"),
    ('\r', "\\r"),
    ('\'', "\\'"),
    ('"', "\\\""),
    ('\u{1a}', "\\Z"),
];

/// Double single quotes, SimpleDB's literal escaping rule.
pub fn escape_select(value: &str) -> String {
    value.replace('\'', "''")
}

/// Apply [`WRITE_ESCAPES`] to `value`.
pub fn escape_write(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match WRITE_ESCAPES.iter().find(|(raw, _)| *raw == c) {
            Some((_, sequence)) => escaped.push_str(sequence),
            None => escaped.push(c),
        }
    }
    escaped
}

/// Reverse [`escape_write`].
///
/// Recognised sequences are `\\`, `\0`, `\n`, `\r`, `\'` and `\"`. Any other
/// backslash sequence, `\Z` included, is kept verbatim.
pub fn decode(value: &str) -> String {
    let mut decoded = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            decoded.push(c);
            continue;
        }
        let replacement = match chars.peek() {
            Some('\\') => Some('\\'),
            Some('0') => Some('\0'),
            Some('n') => Some('\n'),
            Some('r') => Some('\r'),
            Some('\'') => Some('\''),
            Some('"') => Some('"'),
            _ => None,
        };
        match replacement {
            Some(r) => {
                decoded.push(r);
                chars.next();
            }
            None => decoded.push('\\'),
        }
    }

    decoded
}

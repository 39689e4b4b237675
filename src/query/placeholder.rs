//! Named placeholder scanning and substitution.
//!
//! A placeholder is `:` followed by one or more word characters, with
//! `:itemName()` accepted as a whole token. Text inside single or double
//! quotes is never scanned, so literals that were already bound (or typed by
//! hand) cannot be mistaken for placeholders.

use std::ops::Range;

/// Literal placeholder form for the item key pseudo-column.
pub const ITEM_NAME_PLACEHOLDER: &str = ":itemName()";

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Byte ranges of every placeholder token in `sql`, outside quoted text.
///
/// `backslash_escapes` controls whether a backslash escapes the next character
/// inside a quoted literal. Doubled quotes are always treated as an escaped
/// quote.
pub(crate) fn placeholder_spans(sql: &str, backslash_escapes: bool) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut chars = sql.char_indices().peekable();
    let mut quote: Option<char> = None;

    while let Some((pos, c)) = chars.next() {
        if let Some(q) = quote {
            if backslash_escapes && c == '\\' {
                chars.next();
            } else if c == q {
                if chars.peek().map(|(_, n)| *n) == Some(q) {
                    chars.next();
                } else {
                    quote = None;
                }
            }
            continue;
        }

        match c {
            '\'' | '"' => quote = Some(c),
            ':' => {
                if sql[pos..].starts_with(ITEM_NAME_PLACEHOLDER) {
                    let end = pos + ITEM_NAME_PLACEHOLDER.len();
                    spans.push(pos..end);
                    while chars.peek().is_some_and(|(i, _)| *i < end) {
                        chars.next();
                    }
                    continue;
                }
                let mut end = pos + 1;
                while let Some((i, n)) = chars.peek().copied() {
                    if !is_word_char(n) {
                        break;
                    }
                    end = i + n.len_utf8();
                    chars.next();
                }
                if end > pos + 1 {
                    spans.push(pos..end);
                }
            }
            _ => {}
        }
    }

    spans
}

/// Distinct placeholder tokens in order of first appearance.
pub fn placeholders(sql: &str, backslash_escapes: bool) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for span in placeholder_spans(sql, backslash_escapes) {
        let token = &sql[span];
        if !found.iter().any(|f| f == token) {
            found.push(token.to_string());
        }
    }
    found
}

/// Replace every occurrence of `placeholder` with `literal`.
///
/// Only whole tokens match, so `:brand` never touches `:brandname`. The
/// literal is written in a single pass and never rescanned. Returns the new
/// text and the number of replacements.
pub fn substitute(
    sql: &str,
    placeholder: &str,
    literal: &str,
    backslash_escapes: bool,
) -> (String, usize) {
    let mut output = String::with_capacity(sql.len() + literal.len());
    let mut last = 0;
    let mut count = 0;

    for span in placeholder_spans(sql, backslash_escapes) {
        if &sql[span.clone()] != placeholder {
            continue;
        }
        output.push_str(&sql[last..span.start]);
        output.push_str(literal);
        last = span.end;
        count += 1;
    }
    output.push_str(&sql[last..]);

    (output, count)
}

/// Normalise a placeholder name so that `brand` and `:brand` are equivalent.
pub fn normalize(name: &str) -> String {
    if name.starts_with(':') {
        name.to_string()
    } else {
        format!(":{}", name)
    }
}

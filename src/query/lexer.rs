//! Tokenizer for the supported SQL subset.
//!
//! The same tokenizer serves two dialects. Statements emulated by this crate
//! (INSERT, UPDATE, DELETE) escape quotes inside literals with a backslash;
//! SimpleDB SELECT expressions only know doubled quotes. [`LexMode`] picks the
//! rule.

use crate::query::escape::decode;

/// Literal escaping convention used while scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexMode {
    /// Backslash escapes and doubled quotes (emulated statements).
    Emulated,
    /// Doubled quotes only (SimpleDB SELECT).
    Native,
}

impl LexMode {
    fn backslash_escapes(self) -> bool {
        matches!(self, LexMode::Emulated)
    }
}

/// SQL token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Bare identifier or keyword
    Word(String),
    /// Backtick-quoted identifier, unquoted
    Quoted(String),
    /// String literal, already unescaped
    Str(String),
    /// Numeric literal as written
    Number(String),
    /// `itemName()` pseudo-column
    ItemName,
    /// Unbound `:name` placeholder
    Placeholder(String),
    /// Comparison operator
    Op(String),
    LParen,
    RParen,
    Comma,
    Star,
    Semicolon,
}

impl Token {
    /// Whether this is the keyword `kw`, ignoring case.
    pub fn is_keyword(&self, kw: &str) -> bool {
        matches!(self, Token::Word(w) if w.eq_ignore_ascii_case(kw))
    }

    /// Identifier text for bare or backtick-quoted names.
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Token::Word(w) | Token::Quoted(w) => Some(w),
            _ => None,
        }
    }
}

/// Token with its byte range in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub start: usize,
    pub end: usize,
}

/// Tokenizer failure with the byte offset where it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub message: String,
    pub position: usize,
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at offset {}", self.message, self.position)
    }
}

/// Remove quoting from a literal body.
///
/// Doubled quotes collapse to one. In emulated mode backslash sequences are
/// then reversed with [`decode`].
pub fn unquote(raw: &str, quote: char, mode: LexMode) -> String {
    if !mode.backslash_escapes() {
        let doubled: String = [quote, quote].iter().collect();
        return raw.replace(&doubled, &quote.to_string());
    }

    let mut collapsed = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            collapsed.push(c);
            if let Some(next) = chars.next() {
                collapsed.push(next);
            }
        } else if c == quote && chars.peek() == Some(&quote) {
            chars.next();
            collapsed.push('\\');
            collapsed.push(quote);
        } else {
            collapsed.push(c);
        }
    }
    decode(&collapsed)
}

fn is_word_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Bare domain names follow these keywords and may also contain `-` and `.`.
fn is_domain_keyword(previous: &Spanned) -> bool {
    ["INTO", "UPDATE", "FROM"]
        .iter()
        .any(|kw| previous.token.is_keyword(kw))
}

/// Tokenize `sql`.
///
/// # Errors
///
/// Returns `LexError` for unterminated literals or characters outside the
/// supported subset.
pub fn tokenize(sql: &str, mode: LexMode) -> Result<Vec<Spanned>, LexError> {
    let bytes: Vec<(usize, char)> = sql.char_indices().collect();
    let end_of = |i: usize| bytes.get(i).map(|(p, _)| *p).unwrap_or(sql.len());
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let (start, c) = bytes[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let (token, next) = match c {
            '(' => (Token::LParen, i + 1),
            ')' => (Token::RParen, i + 1),
            ',' => (Token::Comma, i + 1),
            '*' => (Token::Star, i + 1),
            ';' => (Token::Semicolon, i + 1),
            '=' => (Token::Op("=".to_string()), i + 1),
            '!' | '<' | '>' => {
                let follow = bytes.get(i + 1).map(|(_, n)| *n);
                match (c, follow) {
                    ('!', Some('=')) | ('<', Some('=')) | ('>', Some('=')) => {
                        (Token::Op(format!("{}=", c)), i + 2)
                    }
                    ('<', Some('>')) => (Token::Op("!=".to_string()), i + 2),
                    ('!', _) => {
                        return Err(LexError {
                            message: "expected '=' after '!'".to_string(),
                            position: start,
                        })
                    }
                    _ => (Token::Op(c.to_string()), i + 1),
                }
            }
            '\'' | '"' => {
                let mut j = i + 1;
                let mut closed = false;
                while j < bytes.len() {
                    let ch = bytes[j].1;
                    if mode.backslash_escapes() && ch == '\\' {
                        j += 2;
                        continue;
                    }
                    if ch == c {
                        if bytes.get(j + 1).map(|(_, n)| *n) == Some(c) {
                            j += 2;
                            continue;
                        }
                        closed = true;
                        break;
                    }
                    j += 1;
                }
                if !closed {
                    return Err(LexError {
                        message: "unterminated string literal".to_string(),
                        position: start,
                    });
                }
                let raw = &sql[end_of(i + 1)..end_of(j)];
                (Token::Str(unquote(raw, c, mode)), j + 1)
            }
            '`' => {
                let mut j = i + 1;
                let mut name = String::new();
                loop {
                    match bytes.get(j).map(|(_, ch)| *ch) {
                        Some('`') if bytes.get(j + 1).map(|(_, n)| *n) == Some('`') => {
                            name.push('`');
                            j += 2;
                        }
                        Some('`') => break,
                        Some(ch) => {
                            name.push(ch);
                            j += 1;
                        }
                        None => {
                            return Err(LexError {
                                message: "unterminated quoted identifier".to_string(),
                                position: start,
                            })
                        }
                    }
                }
                let token = if name.eq_ignore_ascii_case("itemName()") {
                    Token::ItemName
                } else {
                    Token::Quoted(name)
                };
                (token, j + 1)
            }
            ':' => {
                let mut j = i + 1;
                while j < bytes.len() && is_word_char(bytes[j].1) {
                    j += 1;
                }
                if j == i + 1 {
                    return Err(LexError {
                        message: "unexpected ':'".to_string(),
                        position: start,
                    });
                }
                let name = sql[start..end_of(j)].to_string();
                if sql[end_of(j)..].starts_with("()") && name.eq_ignore_ascii_case(":itemName") {
                    (Token::Placeholder(format!("{}()", name)), j + 2)
                } else {
                    (Token::Placeholder(name), j)
                }
            }
            c if c.is_ascii_digit() || (c == '-' || c == '.') && next_is_digit(&bytes, i) => {
                let mut j = i + 1;
                while j < bytes.len() && (bytes[j].1.is_ascii_digit() || bytes[j].1 == '.') {
                    j += 1;
                }
                (Token::Number(sql[start..end_of(j)].to_string()), j)
            }
            c if is_word_start(c) => {
                let domain = tokens.last().is_some_and(is_domain_keyword);
                let mut j = i + 1;
                while j < bytes.len()
                    && (is_word_char(bytes[j].1) || (domain && matches!(bytes[j].1, '-' | '.')))
                {
                    j += 1;
                }
                let word = &sql[start..end_of(j)];
                if word.eq_ignore_ascii_case("itemName") && sql[end_of(j)..].starts_with("()") {
                    (Token::ItemName, j + 2)
                } else {
                    (Token::Word(word.to_string()), j)
                }
            }
            other => {
                return Err(LexError {
                    message: format!("unexpected character '{}'", other),
                    position: start,
                })
            }
        };

        tokens.push(Spanned {
            token,
            start,
            end: end_of(next),
        });
        i = next;
    }

    Ok(tokens)
}

fn next_is_digit(chars: &[(usize, char)], i: usize) -> bool {
    chars.get(i + 1).is_some_and(|(_, c)| c.is_ascii_digit())
}

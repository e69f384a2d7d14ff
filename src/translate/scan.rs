//! Locates `$name`, `${name}` and `$name(args)` placeholders in content text.
//!
//! Longest match wins at each `$` sighting: the brace form ends at the first
//! `}`, the call form requires `(` immediately after the identifier and ends
//! at the matching close paren, and anything else falls back to a bare
//! variable reference. A `$` followed by none of these is literal text.

use std::ops::Range;

use thiserror::Error;

use super::args;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("unterminated argument list in call of {0}")]
    UnterminatedCall(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Place {
    /// `$name` or `${name}`
    Var { name: String },
    /// `$name(...)`; the raw argument text is not yet split
    Call { name: String, raw_args: String },
}

/// A placeholder occurrence; `span` covers the whole reference in the source
/// text, `$` through the final identifier character, `}` or `)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub span: Range<usize>,
    pub place: Place,
}

pub fn is_ident_lead(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub fn is_ident(c: char) -> bool {
    is_ident_lead(c) || c.is_ascii_digit()
}

fn ident_end(text: &str, start: usize) -> usize {
    text[start..]
        .char_indices()
        .find(|(_, c)| !is_ident(*c))
        .map(|(i, _)| start + i)
        .unwrap_or(text.len())
}

/// Finds the next placeholder at or after byte offset `from`.
pub fn next_placeholder(text: &str, from: usize) -> Result<Option<Placeholder>, ScanError> {
    let mut pos = from;
    while let Some(off) = text[pos..].find('$') {
        let dollar = pos + off;
        let rest = &text[dollar + 1..];
        if rest.starts_with('{') {
            if let Some(close) = rest.find('}') {
                // brace form: the name is everything up to the first `}`
                let name = rest[1..close].to_owned();
                return Ok(Some(Placeholder {
                    span: dollar..dollar + 2 + close,
                    place: Place::Var { name },
                }));
            }
            pos = dollar + 1;
            continue;
        }
        let name_end = ident_end(text, dollar + 1);
        if name_end == dollar + 1 {
            // bare `$`, no identifier follows
            pos = dollar + 1;
            continue;
        }
        let name = text[dollar + 1..name_end].to_owned();
        if text[name_end..].starts_with('(') {
            let close = args::matching_paren(text, name_end)
                .ok_or_else(|| ScanError::UnterminatedCall(name.clone()))?;
            let raw_args = text[name_end + 1..close].to_owned();
            return Ok(Some(Placeholder {
                span: dollar..close + 1,
                place: Place::Call { name, raw_args },
            }));
        }
        return Ok(Some(Placeholder {
            span: dollar..name_end,
            place: Place::Var { name },
        }));
    }
    Ok(None)
}

/// Variable-reference scan used over macro bodies: call syntax is not
/// recognized, so `$a(` yields the reference `$a`.
pub fn next_var_ref(text: &str, from: usize) -> Option<Placeholder> {
    let mut pos = from;
    while let Some(off) = text[pos..].find('$') {
        let dollar = pos + off;
        let rest = &text[dollar + 1..];
        if rest.starts_with('{') {
            if let Some(close) = rest.find('}') {
                let name = rest[1..close].to_owned();
                return Some(Placeholder {
                    span: dollar..dollar + 2 + close,
                    place: Place::Var { name },
                });
            }
            pos = dollar + 1;
            continue;
        }
        let name_end = ident_end(text, dollar + 1);
        if name_end == dollar + 1 {
            pos = dollar + 1;
            continue;
        }
        let name = text[dollar + 1..name_end].to_owned();
        return Some(Placeholder {
            span: dollar..name_end,
            place: Place::Var { name },
        });
    }
    None
}

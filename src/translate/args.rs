//! Splits the raw text of a macro call's argument list on top-level commas.
//!
//! A comma delimits arguments only at parenthesis depth zero and outside any
//! quoted region. Each of the three SQL quote characters toggles its own open
//! flag independently, so quoting conventions may interleave without being
//! interpreted.

use thiserror::Error;

const QUOTES: [char; 3] = ['"', '\'', '`'];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SplitError {
    #[error("unterminated quote in argument list")]
    UnterminatedQuote,
    #[error("mismatched parenthesis in argument list")]
    MismatchedParen,
}

fn quote_index(c: char) -> Option<usize> {
    QUOTES.iter().position(|q| *q == c)
}

/// Finds the `)` matching the `(` at byte offset `open`, honoring nested
/// parentheses and quoted regions. Returns the byte offset of the close paren.
pub fn matching_paren(text: &str, open: usize) -> Option<usize> {
    debug_assert!(text[open..].starts_with('('));
    let mut depth = 0usize;
    let mut quotes = [false; 3];
    for (i, c) in text[open..].char_indices() {
        if let Some(q) = quote_index(c) {
            quotes[q] = !quotes[q];
            continue;
        }
        if quotes.iter().any(|open| *open) {
            continue;
        }
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits the text between a call's parentheses into trimmed argument
/// strings. Text inside quotes or nested parens passes through unmodified.
pub fn split_args(raw: &str) -> Result<Vec<String>, SplitError> {
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut quotes = [false; 3];
    let mut start = 0usize;
    for (i, c) in raw.char_indices() {
        if let Some(q) = quote_index(c) {
            quotes[q] = !quotes[q];
            continue;
        }
        if quotes.iter().any(|open| *open) {
            continue;
        }
        match c {
            '(' => depth += 1,
            ')' => depth = depth.checked_sub(1).ok_or(SplitError::MismatchedParen)?,
            ',' if depth == 0 => {
                args.push(raw[start..i].trim().to_owned());
                start = i + 1;
            }
            _ => {}
        }
    }
    if quotes.iter().any(|open| *open) {
        return Err(SplitError::UnterminatedQuote);
    }
    if depth != 0 {
        return Err(SplitError::MismatchedParen);
    }
    let last = raw[start..].trim();
    if args.is_empty() && last.is_empty() {
        // `f()` carries no arguments
        return Ok(args);
    }
    args.push(last.to_owned());
    Ok(args)
}

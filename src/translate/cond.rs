//! Stack-based tracking of nested `#if`/`#else`/`#endif` blocks.

use crate::error::{Result, TranslateError};

/// One open `#if`. `live` is the emission state of the surrounding context
/// at push time, so frames do not need to consult their parents again.
#[derive(Debug, Clone, Copy)]
struct Frame {
    live: bool,
    cond: bool,
    else_seen: bool,
}

impl Frame {
    fn emit(&self) -> bool {
        // the else branch inverts the condition
        self.live && (self.cond != self.else_seen)
    }
}

#[derive(Debug, Default)]
pub struct CondStack {
    frames: Vec<Frame>,
}

impl CondStack {
    /// Whether content at the current nesting level is emitted.
    pub fn active(&self) -> bool {
        self.frames.last().map_or(true, Frame::emit)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push(&mut self, cond: bool) {
        let live = self.active();
        self.frames.push(Frame {
            live,
            cond,
            else_seen: false,
        });
    }

    /// `#else`: a second flip of the same frame, or a flip with no open
    /// frame, is an error.
    pub fn flip(&mut self, line: usize) -> Result<()> {
        match self.frames.last_mut() {
            Some(frame) if !frame.else_seen => {
                frame.else_seen = true;
                Ok(())
            }
            _ => Err(TranslateError::UnexpectedElse { line }),
        }
    }

    /// `#endif`.
    pub fn pop(&mut self, line: usize) -> Result<()> {
        match self.frames.pop() {
            Some(_) => Ok(()),
            None => Err(TranslateError::CondMismatch { line }),
        }
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

/// Evaluates an already-expanded `#if` expression: `==`/`!=` between two
/// operands (integer comparison when both sides parse, string otherwise), or
/// bare truthiness of a single token.
pub fn eval(expr: &str) -> bool {
    if let Some((lhs, rhs)) = expr.split_once("!=") {
        return !operands_equal(lhs, rhs);
    }
    if let Some((lhs, rhs)) = expr.split_once("==") {
        return operands_equal(lhs, rhs);
    }
    let token = expr.trim();
    !token.is_empty() && token != "0"
}

fn operands_equal(lhs: &str, rhs: &str) -> bool {
    let (lhs, rhs) = (lhs.trim(), rhs.trim());
    match (lhs.parse::<i64>(), rhs.parse::<i64>()) {
        (Ok(l), Ok(r)) => l == r,
        _ => lhs == rhs,
    }
}

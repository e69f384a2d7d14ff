//! Resolves placeholders in a line of content against the macro table.

use crate::error::{Result, TranslateError};

use super::args;
use super::scan::{self, Place};
use super::table::MacroTable;

/// Expands `text` left to right, non-overlapping. Undefined variable
/// references stay literal; an undefined name in call position or an
/// argument-count mismatch is fatal. Substituted text is never rescanned.
pub fn expand(table: &MacroTable, text: &str, line: usize) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;
    loop {
        let ph = scan::next_placeholder(text, pos).map_err(|err| TranslateError::Syntax {
            line,
            message: err.to_string(),
        })?;
        let Some(ph) = ph else {
            break;
        };
        out.push_str(&text[pos..ph.span.start]);
        match ph.place {
            Place::Var { name } => match table.variable(&name) {
                Some(value) => out.push_str(value),
                // permissive at top level: leave the reference as written
                None => out.push_str(&text[ph.span.clone()]),
            },
            Place::Call { name, raw_args } => {
                let def =
                    table
                        .lookup_macro(&name)
                        .ok_or_else(|| TranslateError::UndefinedMacro {
                            line,
                            name: name.clone(),
                        })?;
                let call_args =
                    args::split_args(&raw_args).map_err(|err| TranslateError::Syntax {
                        line,
                        message: err.to_string(),
                    })?;
                if call_args.len() != def.params.len() {
                    return Err(TranslateError::WrongArgCount {
                        line,
                        name,
                        expected: def.params.len(),
                        got: call_args.len(),
                    });
                }
                out.push_str(&def.apply(&call_args));
            }
        }
        pos = ph.span.end;
    }
    out.push_str(&text[pos..]);
    Ok(out)
}

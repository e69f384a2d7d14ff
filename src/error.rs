use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TranslateError>;

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// unbalanced #if/#else/#endif nesting
    #[error("{line}: mismatch if/endif")]
    CondMismatch { line: usize },
    #[error("{line}: unexpected #else")]
    UnexpectedElse { line: usize },
    /// a file appeared twice on the active-file stack
    #[error("Recursion detected: {}", .path.display())]
    Recursion { path: PathBuf },
    #[error("{line}: include level limit reached: {}", .path.display())]
    MaxIncludeLevels { line: usize, path: PathBuf },
    #[error("{line}: call of undefined macro {name}")]
    UndefinedMacro { line: usize, name: String },
    #[error("{line}: wrong number of arguments for {name}: expected {expected}, got {got}")]
    WrongArgCount {
        line: usize,
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("{line}: {message}")]
    Syntax { line: usize, message: String },
}

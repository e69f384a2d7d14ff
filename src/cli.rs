use std::path::PathBuf;

use clap::Parser;

/// SQL template preprocessor: expands #include, #define, #if blocks and
/// $name placeholders.
#[derive(Debug, Parser)]
#[command(name = "sqlpp", version, about)]
pub struct Cli {
    /// Template file to translate
    pub input: PathBuf,

    /// Destination file; stdout when omitted
    pub output: Option<PathBuf>,
}

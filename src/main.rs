mod cli;
mod error;
mod translate;

use std::fs::File;
use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;

use crate::cli::Cli;
use crate::error::{Result, TranslateError};
use crate::translate::translator::Translator;

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    let result = match &cli.output {
        Some(path) => File::create(path)
            .map_err(TranslateError::from)
            .and_then(|out| run(&cli, out)),
        None => run(&cli, io::stdout().lock()),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("sqlpp: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run<W: Write>(cli: &Cli, out: W) -> Result<()> {
    let mut translator = Translator::new(out);
    translator.compile(&cli.input)
}

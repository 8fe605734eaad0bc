//! `tx toc` command implementation.

use std::io::Write;
use std::path::PathBuf;

use clap::Args;

use super::options::{RenderOptions, Session, read_input};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the toc command.
#[derive(Args)]
pub(crate) struct TocArgs {
    /// Textile file to read (default: stdin).
    file: Option<PathBuf>,

    #[command(flatten)]
    options: RenderOptions,
}

impl TocArgs {
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let session = Session::open(&self.options)?;
        let ctx = session.context()?;
        let text = read_input(self.file.as_deref())?;

        let result = session.renderer().render(&text, &ctx);
        output.warnings(&result.warnings);

        let mut stdout = std::io::stdout().lock();
        serde_json::to_writer_pretty(&mut stdout, &result.headings)?;
        writeln!(stdout)?;
        Ok(())
    }
}

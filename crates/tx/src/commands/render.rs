//! `tx render` command implementation.

use std::io::Write;
use std::path::PathBuf;

use clap::Args;

use super::options::{RenderOptions, Session, read_input};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Textile file to render (default: stdin).
    file: Option<PathBuf>,

    #[command(flatten)]
    options: RenderOptions,

    /// Exit with an error when rendering produced warnings.
    #[arg(long)]
    strict: bool,
}

impl RenderArgs {
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let session = Session::open(&self.options)?;
        let ctx = session.context()?;
        let text = read_input(self.file.as_deref())?;

        let result = session.renderer().render(&text, &ctx);
        output.warnings(&result.warnings);

        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", result.html)?;
        stdout.flush()?;

        if self.strict && !result.warnings.is_empty() {
            return Err(CliError::Validation(format!(
                "Rendering produced {} warning(s)",
                result.warnings.len()
            )));
        }
        Ok(())
    }
}

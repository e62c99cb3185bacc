//! lineslim: shrink the DWARF line tables of an ELF32 binary.

mod cli;

use std::fs;
use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Parser;
use lineslim::{RewriteOptions, dump_image, logging, rewrite_file};
use tracing::info;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    logging::init(cli.verbosity())?;

    if cli.dump {
        let data =
            fs::read(&cli.file).with_context(|| format!("failed to read {}", cli.file.display()))?;
        let mut stdout = io::stdout().lock();
        dump_image(&data, &mut stdout)?;
        stdout.flush()?;
        return Ok(());
    }

    let options = RewriteOptions {
        output: cli.output.clone(),
    };
    let stats = rewrite_file(&cli.file, &options)?;
    info!(
        file = %cli.file.display(),
        units = stats.units,
        rows = stats.rows_decoded,
        kept = stats.rows_kept,
        old_size = stats.old_line_size,
        new_size = stats.new_line_size,
        file_size = stats.file_size,
        "shrank .debug_line"
    );
    Ok(())
}

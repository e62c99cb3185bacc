//! Command-line interface definitions for lineslim.

use std::path::PathBuf;

use clap::Parser;
use lineslim::logging::Verbosity;

/// Shrink the DWARF line tables of an ELF32 binary in place.
#[derive(Parser)]
#[command(name = "lineslim", version, about)]
pub struct Cli {
    /// ELF32 file to rewrite.
    pub file: PathBuf,

    /// Write the result to this path instead of replacing FILE.
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Print the decoded line tables and exit without writing anything.
    #[arg(long, short = 'd', conflicts_with = "output")]
    pub dump: bool,

    /// Only report warnings and errors.
    #[arg(long, short = 'q', conflicts_with = "verbose")]
    pub quiet: bool,

    /// Report every rewritten line program and section.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl Cli {
    /// Log level selected by the flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }
}

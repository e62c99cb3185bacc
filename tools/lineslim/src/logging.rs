//! `tracing` subscriber setup for the command-line tool.

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

/// How much the tool reports when `RUST_LOG` is not set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Verbosity {
    /// Warnings and errors only.
    Quiet,
    /// The per-file summary.
    #[default]
    Normal,
    /// Per-unit and per-section detail.
    Verbose,
}

impl Verbosity {
    /// Picks the level from the `--verbose`/`--quiet` flags.
    #[must_use]
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        match (verbose, quiet) {
            (true, _) => Self::Verbose,
            (false, true) => Self::Quiet,
            (false, false) => Self::Normal,
        }
    }

    /// The filter directive used in place of `RUST_LOG`.
    #[must_use]
    pub fn directive(self) -> &'static str {
        match self {
            Self::Quiet => "warn",
            Self::Normal => "info",
            Self::Verbose => "debug",
        }
    }
}

/// Installs a global `fmt` subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence over `verbosity` when set.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init(verbosity: Verbosity) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!(err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_to_levels() {
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
        assert_eq!(Verbosity::from_flags(true, false).directive(), "debug");
        assert_eq!(Verbosity::from_flags(false, true).directive(), "warn");
        assert_eq!(Verbosity::default().directive(), "info");
    }
}

//! Command-line interface definitions

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::Level;

/// Bring a target directory up to date with a source directory without
/// overwriting or deleting anything already in the target
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Source directory (positional or --source)
    #[arg(value_name = "SOURCE")]
    pub source_positional: Option<PathBuf>,

    /// Target directory (positional or --target)
    #[arg(value_name = "TARGET")]
    pub target_positional: Option<PathBuf>,

    /// Source directory (alternative to positional arg)
    #[arg(short, long, conflicts_with = "source_positional")]
    pub source: Option<PathBuf>,

    /// Target directory (alternative to positional arg)
    #[arg(short, long, conflicts_with = "target_positional")]
    pub target: Option<PathBuf>,

    /// Show what would be copied without touching the target
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Remove new directories that end up empty because their files were
    /// found relocated elsewhere in the target
    #[arg(long)]
    pub prune_empty_dirs: bool,

    /// Show progress information
    #[arg(long)]
    pub progress: bool,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress all output except errors)
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Get the source directory (from positional or flag)
    ///
    /// # Errors
    ///
    /// Returns an error if no source was given
    pub fn get_source(&self) -> Result<PathBuf> {
        self.source_positional
            .clone()
            .or_else(|| self.source.clone())
            .ok_or_else(|| anyhow::anyhow!("Source must be specified (positional or --source)"))
    }

    /// Get the target directory (from positional or flag)
    ///
    /// # Errors
    ///
    /// Returns an error if no target was given
    pub fn get_target(&self) -> Result<PathBuf> {
        self.target_positional
            .clone()
            .or_else(|| self.target.clone())
            .ok_or_else(|| anyhow::anyhow!("Target must be specified (positional or --target)"))
    }

    /// Validate command-line arguments
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - Source/target not specified
    /// - Source or target is not an existing directory (symlinks are not followed)
    /// - Source and target are the same directory
    /// - Both --quiet and --verbose options are used
    pub fn validate(&self) -> Result<()> {
        let source = self.get_source()?;
        let target = self.get_target()?;

        for (label, path) in [("Source", &source), ("Target", &target)] {
            let meta = std::fs::symlink_metadata(path).map_err(|_| {
                anyhow::anyhow!("{} path does not exist: {}", label, path.display())
            })?;
            if !meta.is_dir() {
                anyhow::bail!("{} path must be a directory: {}", label, path.display());
            }
        }

        if source.canonicalize()? == target.canonicalize()? {
            anyhow::bail!(
                "Source and target must be different directories: {}",
                source.display()
            );
        }

        if self.quiet && self.verbose > 0 {
            anyhow::bail!("Cannot use both --quiet and --verbose options");
        }

        Ok(())
    }

    /// Maximum log level for the chosen verbosity
    #[must_use]
    pub const fn log_level(&self) -> Level {
        if self.quiet {
            return Level::ERROR;
        }
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

impl Args {
    /// Create a test Args instance with default values (for testing)
    #[cfg(test)]
    pub fn test_default(source: PathBuf, target: PathBuf) -> Self {
        Self {
            source_positional: None,
            target_positional: None,
            source: Some(source),
            target: Some(target),
            dry_run: false,
            prune_empty_dirs: false,
            progress: false,
            verbose: 0,
            quiet: false,
        }
    }
}

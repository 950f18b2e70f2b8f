//! dirsync: bring a target directory up to date with a source directory
//!
//! Indexes the target, reconciles the source into it, optionally prunes
//! directories left empty by relocations and prints the resulting report.

use anyhow::{Context, Result};
use clap::Parser;
use dirsync::cli::Args;
use dirsync::{DirectorySyncer, ProgressTracker, SyncReport};
use tracing::info;

fn main() {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging based on verbosity and quiet mode
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error: failed to initialize logging: {e}");
        std::process::exit(1);
    }

    match run(&args) {
        Ok(report) => {
            if !args.quiet {
                print!("{}", report.render());
            }
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}

fn run(args: &Args) -> Result<SyncReport> {
    // Validate arguments
    args.validate().context("Invalid arguments")?;

    let source = args.get_source()?;
    let target = args.get_target()?;

    info!("Starting dirsync v{}", env!("CARGO_PKG_VERSION"));
    info!("Source: {}", source.display());
    info!("Target: {}", target.display());
    if args.dry_run {
        info!("Dry run: the target will not be modified");
    }

    let progress = if args.progress && !args.quiet {
        ProgressTracker::new()
    } else {
        ProgressTracker::hidden()
    };

    let mut syncer = DirectorySyncer::new(source, target, args.dry_run).with_progress(progress);
    let index = syncer
        .build_target_index()
        .context("Failed to index target directory")?;
    let mut report = syncer.sync(&index).context("Syncing failed")?;

    if args.prune_empty_dirs {
        report = syncer
            .cleanup_empty_directories(report)
            .context("Failed to prune empty directories")?;
    }

    Ok(report)
}

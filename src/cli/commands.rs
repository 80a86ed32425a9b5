//! Command handler implementations
//!
//! This module contains the implementation of all CLI commands.

use crate::cli::progress::{
    format_bytes, print_header, print_info, print_success, print_warning, StageProgress,
};
use crate::cli::{Args, Commands, RunArgs};
use crate::core::cache::MetadataCache;
use crate::core::config::{init_config, Config};
use crate::core::store::{IngestSummary, PhotoStore};
use crate::core::tree::TreeReport;
use crate::duplicate::{find_duplicates, log_duplicates, report_lines, DuplicateStats};
use anyhow::{bail, Result};
use log::{debug, info};
use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Run the appropriate command based on CLI arguments
pub fn run_command(args: &Args, config: &Config, shutdown_flag: Arc<AtomicBool>) -> Result<()> {
    match &args.command {
        Some(Commands::GenerateConfig { output }) => {
            generate_config_file(output.clone())?;
        }
        Some(Commands::ShowConfig) => {
            show_config(config);
        }
        Some(Commands::Duplicates { output }) => {
            let mut config = config.clone();
            if let Some(output) = output {
                config.output.directory = output.clone();
            }
            show_duplicates(&config)?;
        }
        Some(Commands::Run(run_args)) => {
            run(&args.run.merged(run_args), config, || {
                shutdown_flag.load(Ordering::SeqCst)
            })?;
        }
        None => {
            run(&args.run, config, || shutdown_flag.load(Ordering::SeqCst))?;
        }
    }

    Ok(())
}

/// Ingest every configured directory, then report and build the tree
///
/// The cache is saved after each directory. `should_stop` is polled before
/// each directory and after each file; once it returns true the cache is
/// still saved and the tree is left alone.
pub fn run<F>(run_args: &RunArgs, config: &Config, should_stop: F) -> Result<()>
where
    F: Fn() -> bool,
{
    let mut config = config.clone();
    if let Some(ref output) = run_args.output {
        config.output.directory = output.clone();
    }
    if run_args.report_duplicates {
        config.duplicates.report = true;
    }

    let output_dir = config.output_dir()?.to_path_buf();
    let builder = config.tree_builder()?;

    let mut directories = config.scan.directories.clone();
    directories.extend(run_args.directories.iter().cloned());
    if directories.is_empty() {
        bail!("No directories to ingest. Pass --directory or set [scan] directories in the config file.");
    }

    let cache = MetadataCache::in_output_dir(&output_dir);
    let mut store = if config.cache.enabled {
        cache.load(config.fingerprinter())
    } else {
        PhotoStore::new(config.fingerprinter())
    };
    info!(
        "Starting with {} known files in {} groups",
        store.len(),
        store.group_count()
    );

    let summary = ingest_directories(
        &mut store,
        &directories,
        &config,
        config.cache.enabled.then_some(&cache),
        &should_stop,
    )?;
    print_ingest_summary(&summary, &store);

    if summary.interrupted {
        print_warning("Interrupted: cache saved, output tree not updated");
        return Ok(());
    }

    if config.duplicates.report {
        let groups = find_duplicates(&store);
        let stats = log_duplicates(&groups);
        print_duplicate_stats(&stats);
    }

    if run_args.no_tree {
        debug!("Skipping output tree");
        return Ok(());
    }

    let stage = StageProgress::new("Building output");
    let report = match builder.build(&store, |p| stage.update(p.current, p.total, None)) {
        Ok(report) => report,
        Err(e) => {
            stage.finish_with_error(&e.to_string());
            return Err(e.into());
        }
    };
    stage.finish();
    print_tree_report(&report, builder.output_root());

    Ok(())
}

/// Ingest each directory in turn, saving the cache after each one
fn ingest_directories(
    store: &mut PhotoStore,
    directories: &[PathBuf],
    config: &Config,
    cache: Option<&MetadataCache>,
    should_stop: &dyn Fn() -> bool,
) -> Result<IngestSummary> {
    let mut summary = IngestSummary::default();

    for directory in directories {
        if should_stop() {
            summary.interrupted = true;
            break;
        }

        let stage = StageProgress::new("Reading files");
        let result = store.add_directory(directory, config.scan.follow_symlinks, |p| {
            stage.update(p.current, p.total, Some(p.path));
            if should_stop() {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        match result {
            Ok(dir_summary) => {
                stage.finish();
                debug!(
                    "{}: {} added, {} already known, {} failed",
                    directory.display(),
                    dir_summary.added,
                    dir_summary.already_known,
                    dir_summary.failures.len()
                );
                summary.merge(dir_summary);
            }
            Err(e) => {
                stage.finish_with_error("skipped");
                stage.log_warning(&format!("Skipping {}: {}", directory.display(), e));
            }
        }

        if let Some(cache) = cache {
            cache.save(store)?;
            debug!("Saved cache to {}", cache.path().display());
        }
    }

    Ok(summary)
}

/// Load the cache and print the likely duplicates it records
pub fn show_duplicates(config: &Config) -> Result<()> {
    let output_dir = config.output_dir()?;
    let cache = MetadataCache::in_output_dir(output_dir);
    let store = cache.load(config.fingerprinter());

    if store.is_empty() {
        print_info(&format!("No cached files found in {}", cache.path().display()));
        return Ok(());
    }

    let groups = find_duplicates(&store);
    print_header("Possible Duplicates");
    for line in report_lines(&groups) {
        println!("  {}", line);
    }

    print_duplicate_stats(&DuplicateStats::from_groups(&groups));
    Ok(())
}

fn print_ingest_summary(summary: &IngestSummary, store: &PhotoStore) {
    print_success(&format!(
        "Read {} new files ({} already known, {} unreadable)",
        summary.added,
        summary.already_known,
        summary.failures.len()
    ));
    print_info(&format!(
        "{} files in {} distinct groups",
        store.len(),
        store.group_count()
    ));
}

fn print_duplicate_stats(stats: &DuplicateStats) {
    if stats.groups == 0 {
        print_info("No possible duplicates found");
        return;
    }
    print_info(&format!(
        "{} of {} files in {} groups are redundant, using {}",
        stats.redundant_files,
        stats.files,
        stats.groups,
        format_bytes(stats.redundant_bytes)
    ));
}

fn print_tree_report(report: &TreeReport, output_root: &Path) {
    print_success(&format!(
        "Linked {} files into {} ({} already present)",
        report.linked,
        output_root.display(),
        report.already_present
    ));
    if report.unknown > 0 {
        print_info(&format!("{} files without a date in Unknown", report.unknown));
    }
    if report.invalid > 0 {
        print_warning(&format!(
            "{} files with an unreadable date in Invalid",
            report.invalid
        ));
    }
    if report.failed > 0 {
        print_warning(&format!("{} links could not be created", report.failed));
    }
}

/// Generate a config file at the specified path or standard location
pub fn generate_config_file(output: Option<PathBuf>) -> Result<()> {
    let output_path = match output {
        Some(path) => {
            fs::write(&path, Config::generate_default_config())?;
            path
        }
        None => init_config()?,
    };

    info!("Configuration file: {}", output_path.display());
    info!("Edit this file to set the output directory and the directories to ingest.");

    Ok(())
}

/// Show the current configuration settings
pub fn show_config(config: &Config) {
    let config_path = Config::get_active_config_path();
    info!("Configuration file: {}", config_path.display());
    if !config_path.exists() {
        info!("(Using default settings - no config file found)");
    }
    info!("");
    info!("Current Configuration:");
    info!("----------------------");
    info!("[output]");
    info!("  directory = \"{}\"", config.output.directory.display());
    if config.output_dir().is_err() {
        info!("  ⚠ No output directory set - pass --output or edit the config file");
    }
    info!(
        "  collision_policy = {:?}",
        config.output.collision_policy
    );
    info!("");
    info!("[scan]");
    info!("  directories = {:?}", config.scan.directories);
    info!("  follow_symlinks = {}", config.scan.follow_symlinks);
    info!("");
    info!("[fingerprint]");
    info!("  prefix_len = {}", config.fingerprint.prefix_len);
    info!("");
    info!("[cache]");
    info!("  enabled = {}", config.cache.enabled);
    info!("");
    info!("[duplicates]");
    info!("  report = {}", config.duplicates.report);
    info!("");
    info!("[logging]");
    info!("  level = \"{}\"", config.logging.level);
    info!("  log_to_file = {}", config.logging.log_to_file);
    info!("  log_file = \"{}\"", config.logging.log_file.display());
}

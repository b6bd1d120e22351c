//! Sync command - brings the data directory in line with the manifest

use anyhow::{Context, Result};
use console::style;
use humansize::{format_size, BINARY};
use patchsync_core::{
    format_speed, init_session_logging, HttpTransport, PatchSession, SessionHandle, SessionPhase,
    SessionReport, Settings,
};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tracing_subscriber::EnvFilter;

use crate::progress::TerminalObserver;

/// Arguments for the sync command
pub struct SyncArgs {
    /// Settings loaded from the configuration file
    pub settings: Settings,
    /// Manifest location override
    pub manifest_url: Option<String>,
    /// Fallback base URL override
    pub fallback_url: Option<String>,
    /// Data directory override
    pub data_dir: Option<PathBuf>,
    /// State directory override
    pub state_dir: Option<PathBuf>,
    /// Force download verification on
    pub verify: bool,
    /// Skip the session log file
    pub no_log_file: bool,
    /// Console log filter directive
    pub log_filter: &'static str,
    /// Hide the progress bar and summary
    pub quiet: bool,
    /// Suppress output (for scripting)
    pub silent: bool,
    /// Receives the session handle for the interrupt handler
    pub session_slot: Arc<OnceLock<SessionHandle>>,
}

/// Apply command-line overrides on top of the loaded settings
pub fn effective_settings(args: &SyncArgs) -> Settings {
    let mut settings = args.settings.clone();
    if let Some(url) = &args.manifest_url {
        settings.server.manifest_url = Some(url.clone());
    }
    if let Some(url) = &args.fallback_url {
        settings.server.fallback_base_url = Some(url.clone());
    }
    if let Some(dir) = &args.data_dir {
        settings.paths.data_dir = dir.clone();
    }
    if let Some(dir) = &args.state_dir {
        settings.paths.state_dir = dir.clone();
    }
    if args.verify {
        settings.verify.verify_downloads = true;
    }
    if args.no_log_file {
        settings.behavior.log_file = false;
    }
    settings
}

/// Execute the sync command
///
/// Returns `false` when the session ended in `Errored`.
pub fn execute(args: SyncArgs) -> Result<bool> {
    let settings = effective_settings(&args);
    let config = settings
        .to_sync_config()
        .context("Invalid sync configuration")?;

    let log_file = settings.behavior.log_file.then(|| config.paths().log_file);
    let _logging = init_session_logging(log_file.as_deref(), EnvFilter::new(args.log_filter))
        .context("Failed to initialize logging")?;

    let silent = args.silent;
    let quiet = args.quiet;

    println_if!(
        quiet,
        "{} {}",
        style("Manifest:").bold(),
        style(&config.manifest_url).cyan()
    );
    if let Some(fallback) = &config.fallback_base_url {
        println_if!(quiet, "  Fallback: {}", fallback);
    }
    println_if!(quiet, "  Data: {}", config.data_dir.display());
    println_if!(quiet);

    let transport = HttpTransport::from_config(&config).context("Failed to create HTTP client")?;
    let mut session = PatchSession::new(config, transport, TerminalObserver::new(quiet))
        .context("Invalid sync configuration")?;
    let _ = args.session_slot.set(session.handle());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let report = runtime
        .block_on(session.run())
        .context("Patch session could not start")?;

    if !quiet {
        print_summary(&report);
    } else if !silent {
        if let Some(error) = &report.error {
            eprintln!("{} {}", style("Error:").red().bold(), error);
        }
    }

    Ok(report.phase != SessionPhase::Errored)
}

fn print_summary(report: &SessionReport) {
    if let Some(discarded) = &report.discarded {
        println!(
            "{} Discarded interrupted download of {}",
            style("Note:").yellow(),
            discarded
        );
    }

    match report.phase {
        SessionPhase::Errored => {
            println!(
                "{} {}",
                style("Failed:").red().bold(),
                report.error.as_deref().unwrap_or("unknown error")
            );
        }
        _ if report.manifest_error.is_some() => {
            println!(
                "{} Unable to download patch list: {}",
                style("Warning:").yellow().bold(),
                report.manifest_error.as_deref().unwrap_or_default()
            );
        }
        _ if report.fetched.is_empty() => {
            println!(
                "{} All {} files are up to date",
                style("✓").green().bold(),
                report.skipped.len()
            );
        }
        _ => {
            for name in &report.fetched {
                println!("  {} {}", style("↓").cyan(), name);
            }
            let secs = report.elapsed.as_secs_f64();
            let speed = if secs > 0.0 {
                (report.bytes_downloaded as f64 / secs) as u64
            } else {
                0
            };
            println!(
                "{} Updated {} files ({} at {}), {} already up to date, in {:.1}s",
                style("✓").green().bold(),
                report.fetched.len(),
                format_size(report.bytes_downloaded, BINARY),
                format_speed(speed),
                report.skipped.len(),
                secs
            );
        }
    }
}

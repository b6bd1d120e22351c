//! Status command - shows cache and recovery state

use anyhow::{Context, Result};
use console::style;
use patchsync_core::{ChecksumCache, RecoveryMarker, Settings, StatePaths};
use serde::Serialize;
use std::path::PathBuf;

/// Arguments for the status command
pub struct StatusArgs {
    /// Settings loaded from the configuration file
    pub settings: Settings,
    /// Custom configuration file path
    pub config_file: Option<PathBuf>,
    /// Data directory override
    pub data_dir: Option<PathBuf>,
    /// State directory override
    pub state_dir: Option<PathBuf>,
    /// Output in JSON format
    pub json: bool,
    /// Suppress output (for scripting)
    pub silent: bool,
}

/// Snapshot of on-disk session state
#[derive(Debug, Serialize)]
pub struct StatusReport {
    /// Manifest location from settings
    pub manifest_url: Option<String>,
    /// Data directory
    pub data_dir: PathBuf,
    /// State directory
    pub state_dir: PathBuf,
    /// Checksum cache file
    pub cache_file: PathBuf,
    /// Number of cached checksums
    pub cached_entries: usize,
    /// File left half-downloaded by an interrupted session
    pub interrupted_file: Option<String>,
    /// Session log file, when present
    pub log_file: Option<PathBuf>,
}

/// Gather state for a data and state directory
pub fn collect(settings: &Settings, data_dir: PathBuf, state_dir: PathBuf) -> Result<StatusReport> {
    let paths = StatePaths::new(&state_dir);

    let mut cache = ChecksumCache::new(&paths.cache_file);
    let cached_entries = cache
        .inspect()
        .with_context(|| format!("Failed to read checksum cache {}", paths.cache_file.display()))?;

    let interrupted_file = RecoveryMarker::new(&paths.marker_file)
        .current()
        .context("Failed to read recovery marker")?;

    Ok(StatusReport {
        manifest_url: settings.server.manifest_url.clone(),
        data_dir,
        state_dir,
        cache_file: paths.cache_file,
        cached_entries,
        interrupted_file,
        log_file: paths.log_file.exists().then_some(paths.log_file),
    })
}

/// Execute the status command
pub fn execute(args: StatusArgs) -> Result<()> {
    let data_dir = args
        .data_dir
        .unwrap_or_else(|| args.settings.paths.data_dir.clone());
    let state_dir = args
        .state_dir
        .unwrap_or_else(|| args.settings.paths.state_dir.clone());
    let report = collect(&args.settings, data_dir, state_dir)?;

    if args.silent {
        return Ok(());
    }

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize status")?;
        println!("{}", json);
        return Ok(());
    }

    println!("{}", style("Patchsync Status").bold());
    println!();
    if let Some(path) = args.config_file.or_else(Settings::config_path) {
        println!("  {} {}", style("Config file:").dim(), path.display());
    }
    match &report.manifest_url {
        Some(url) => println!("  {} {}", style("Manifest:").dim(), url),
        None => println!(
            "  {} {}",
            style("Manifest:").dim(),
            style("not configured").yellow()
        ),
    }
    println!("  {} {}", style("Data dir:").dim(), report.data_dir.display());
    println!("  {} {}", style("State dir:").dim(), report.state_dir.display());
    println!();

    println!(
        "  {} {} entries ({})",
        style("Checksum cache:").dim(),
        report.cached_entries,
        report.cache_file.display()
    );

    match &report.interrupted_file {
        Some(name) => println!(
            "  {} {} {}",
            style("Interrupted download:").dim(),
            style(name).yellow(),
            style("(discarded on next sync)").dim()
        ),
        None => println!("  {} none", style("Interrupted download:").dim()),
    }

    if let Some(log) = &report.log_file {
        println!("  {} {}", style("Last session log:").dim(), log.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_empty_state() {
        let dir = TempDir::new().unwrap();
        let report = collect(
            &Settings::default(),
            dir.path().join("Data"),
            dir.path().join("Cache"),
        )
        .unwrap();

        assert_eq!(report.cached_entries, 0);
        assert!(report.interrupted_file.is_none());
        assert!(report.log_file.is_none());
        assert!(report.manifest_url.is_none());
    }

    #[test]
    fn test_collect_reports_marker_and_cache() {
        let dir = TempDir::new().unwrap();
        let state_dir = dir.path().join("Cache");
        let paths = StatePaths::new(&state_dir);

        RecoveryMarker::new(&paths.marker_file)
            .arm("maps/big.pak")
            .unwrap();
        let mut cache = ChecksumCache::new(&paths.cache_file);
        cache.put("a.dat", &"AB".repeat(32));
        cache.save().unwrap();

        let report = collect(&Settings::default(), dir.path().join("Data"), state_dir).unwrap();
        assert_eq!(report.cached_entries, 1);
        assert_eq!(report.interrupted_file.as_deref(), Some("maps/big.pak"));
    }

    #[test]
    fn test_status_report_json() {
        let report = StatusReport {
            manifest_url: Some("http://patch.example.com/plist.txt".to_string()),
            data_dir: PathBuf::from("Data"),
            state_dir: PathBuf::from("Cache"),
            cache_file: PathBuf::from("Cache/hash/cache.txt"),
            cached_entries: 3,
            interrupted_file: None,
            log_file: None,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"cached_entries\":3"));
        assert!(json.contains("\"interrupted_file\":null"));
    }
}

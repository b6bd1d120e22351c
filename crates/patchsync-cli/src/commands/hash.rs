//! Hash command - prints the checksum the cache would record for a file

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use patchsync_core::{parse_size, HashEngine, Settings};
use std::path::Path;

/// Execute the hash command
pub fn execute(file: &Path, settings: &Settings, silent: bool) -> Result<()> {
    let interval = parse_size(&settings.verify.hash_progress_interval)
        .context("Invalid verify.hash_progress_interval")?;

    let size = std::fs::metadata(file)
        .with_context(|| format!("Failed to read {}", file.display()))?
        .len();

    println_if!(
        silent,
        "{} {} ({})",
        style("Hashing").bold(),
        style(file.display()).cyan(),
        humansize::format_size(size, humansize::BINARY)
    );

    let pb = if silent {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.green} [{bar:40.cyan/blue}] {pos:>3}%")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        pb
    };

    let pb_clone = pb.clone();
    let mut engine = HashEngine::new()
        .progress_interval(interval)
        .on_progress(move |percent| pb_clone.set_position(u64::from(percent)));

    let checksum = engine
        .hash_file(file)
        .with_context(|| format!("Failed to hash {}", file.display()))?;

    pb.finish_and_clear();

    // The checksum is the useful output, so it is printed even in silent mode
    if silent {
        println!("{}", checksum);
    } else {
        println!();
        println!("{} ({}):", style("SHA-256").green().bold(), file.display());
        println!("{}", checksum);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_hash_missing_file() {
        let result = execute(Path::new("/nonexistent/file.dat"), &Settings::default(), true);
        assert!(result.is_err());
    }

    #[test]
    fn test_hash_rejects_bad_interval() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"data").unwrap();

        let mut settings = Settings::default();
        settings.verify.hash_progress_interval = "often".to_string();
        assert!(execute(file.path(), &settings, true).is_err());
    }

    #[test]
    fn test_hash_existing_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"hello").unwrap();
        assert!(execute(file.path(), &Settings::default(), true).is_ok());
    }
}

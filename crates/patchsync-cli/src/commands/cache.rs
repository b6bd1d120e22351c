//! Cache command - inspects or clears the checksum cache

use anyhow::{Context, Result};
use console::style;
use dialoguer::Confirm;
use patchsync_core::{ChecksumCache, StatePaths};
use std::collections::BTreeMap;
use std::path::Path;

fn open_cache(state_dir: &Path) -> Result<ChecksumCache> {
    let paths = StatePaths::new(state_dir);
    let mut cache = ChecksumCache::new(&paths.cache_file);
    cache
        .inspect()
        .with_context(|| format!("Failed to read checksum cache {}", paths.cache_file.display()))?;
    Ok(cache)
}

/// List cached checksums
pub fn show(state_dir: &Path, json: bool, silent: bool) -> Result<()> {
    let cache = open_cache(state_dir)?;

    if silent {
        return Ok(());
    }

    if json {
        let entries: BTreeMap<&str, &str> = cache.iter().collect();
        let json =
            serde_json::to_string_pretty(&entries).context("Failed to serialize checksum cache")?;
        println!("{}", json);
        return Ok(());
    }

    if cache.is_empty() {
        println!(
            "{} {}",
            style("Checksum cache is empty:").dim(),
            cache.path().display()
        );
        return Ok(());
    }

    println!(
        "{} {} entries ({})",
        style("Checksum cache:").bold(),
        cache.len(),
        cache.path().display()
    );
    println!();
    for (filename, checksum) in cache.iter() {
        println!("{}  {}", checksum, filename);
    }

    Ok(())
}

/// Delete the checksum cache, asking first unless `skip_confirm`
pub fn clear(state_dir: &Path, skip_confirm: bool, silent: bool) -> Result<()> {
    let mut cache = open_cache(state_dir)?;
    let count = cache.len();

    if !skip_confirm && !confirm_clear(count)? {
        println_if!(silent, "{}", style("Cancelled").yellow());
        return Ok(());
    }

    cache.clear().context("Failed to clear checksum cache")?;
    println_if!(
        silent,
        "{} Cleared {} cached checksums; every file will be hashed on the next sync",
        style("✓").green().bold(),
        count
    );
    Ok(())
}

fn confirm_clear(count: usize) -> Result<bool> {
    Confirm::new()
        .with_prompt(format!(
            "Clear {} cached checksums? Every file will be hashed again on the next sync",
            count
        ))
        .default(false)
        .interact()
        .context("Failed to get user confirmation")
}

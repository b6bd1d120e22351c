//! Integration tests for the patchsync CLI
//!
//! These tests run the binary against temporary directories and local
//! manifests, so no network access is required.

use assert_cmd::Command;
use predicates::prelude::*;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Get a command for the patchsync binary that ignores the user's config
#[allow(deprecated)]
fn patchsync(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("patchsync").unwrap();
    cmd.env_remove("PATCHSYNC_MANIFEST_URL")
        .arg("--config")
        .arg(dir.path().join("patchsync_config.toml"));
    cmd
}

fn sha256_upper(data: &[u8]) -> String {
    hex::encode_upper(Sha256::digest(data))
}

struct Layout {
    data_dir: PathBuf,
    state_dir: PathBuf,
    manifest: PathBuf,
}

fn layout(dir: &TempDir, manifest: &str) -> Layout {
    let data_dir = dir.path().join("Data");
    let state_dir = dir.path().join("Cache");
    let manifest_path = dir.path().join("plist.txt");
    fs::create_dir_all(&data_dir).unwrap();
    fs::write(&manifest_path, manifest).unwrap();
    Layout {
        data_dir,
        state_dir,
        manifest: manifest_path,
    }
}

fn sync_args<'a>(cmd: &'a mut Command, layout: &Layout) -> &'a mut Command {
    cmd.arg("sync")
        .arg("--manifest-url")
        .arg(&layout.manifest)
        .arg("--data-dir")
        .arg(&layout.data_dir)
        .arg("--state-dir")
        .arg(&layout.state_dir)
}

fn cache_file(state_dir: &Path) -> PathBuf {
    state_dir.join("hash").join("cache.txt")
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_flag() {
    let dir = TempDir::new().unwrap();
    patchsync(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("checksum manifest"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("sync"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("cache"))
        .stdout(predicate::str::contains("hash"));
}

#[test]
fn test_version_flag() {
    let dir = TempDir::new().unwrap();
    patchsync(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("patchsync"))
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_sync_help() {
    let dir = TempDir::new().unwrap();
    patchsync(&dir)
        .args(["sync", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--manifest-url"))
        .stdout(predicate::str::contains("--fallback-url"))
        .stdout(predicate::str::contains("--verify"))
        .stdout(predicate::str::contains("--no-log-file"));
}

#[test]
fn test_completions_bash() {
    let dir = TempDir::new().unwrap();
    patchsync(&dir)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("patchsync"));
}

#[test]
fn test_mangen_writes_pages() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("man");
    patchsync(&dir)
        .args(["mangen", "--out-dir"])
        .arg(&out)
        .assert()
        .success();
    assert!(out.join("patchsync.1").exists());
    assert!(out.join("patchsync-sync.1").exists());
}

// ============================================================================
// Hash Tests
// ============================================================================

#[test]
fn test_hash_prints_uppercase_sha256() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("sample.dat");
    fs::write(&file, b"hello").unwrap();

    patchsync(&dir)
        .arg("hash")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "2CF24DBA5FB0A30E26E83B2AC5B9E29E1B161E5C1FA7425E73043362938B9824",
        ));
}

#[test]
fn test_hash_silent_prints_bare_checksum() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("sample.dat");
    fs::write(&file, b"hello").unwrap();

    patchsync(&dir)
        .args(["--silent", "hash"])
        .arg(&file)
        .assert()
        .success()
        .stdout(format!("{}\n", sha256_upper(b"hello")));
}

#[test]
fn test_hash_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    patchsync(&dir)
        .arg("hash")
        .arg(dir.path().join("missing.dat"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

// ============================================================================
// Config Tests
// ============================================================================

#[test]
fn test_config_path_uses_override() {
    let dir = TempDir::new().unwrap();
    patchsync(&dir)
        .args(["config", "--path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("patchsync_config.toml"));
}

#[test]
fn test_config_init_then_show_json() {
    let dir = TempDir::new().unwrap();
    patchsync(&dir)
        .args(["config", "--init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created configuration file"));
    assert!(dir.path().join("patchsync_config.toml").exists());

    patchsync(&dir)
        .args(["config", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"hash_progress_interval\""))
        .stdout(predicate::str::contains("\"state_dir\""));
}

// ============================================================================
// Status and Cache Tests
// ============================================================================

#[test]
fn test_status_reports_interrupted_download() {
    let dir = TempDir::new().unwrap();
    let state_dir = dir.path().join("Cache");
    fs::create_dir_all(state_dir.join("session")).unwrap();
    fs::write(state_dir.join("session").join("patching"), "maps/big.pak").unwrap();

    patchsync(&dir)
        .args(["status", "--json", "--state-dir"])
        .arg(&state_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"interrupted_file\": \"maps/big.pak\""))
        .stdout(predicate::str::contains("\"cached_entries\": 0"));
}

#[test]
fn test_cache_show_and_clear() {
    let dir = TempDir::new().unwrap();
    let state_dir = dir.path().join("Cache");
    fs::create_dir_all(state_dir.join("hash")).unwrap();
    let checksum = sha256_upper(b"alpha");
    fs::write(cache_file(&state_dir), format!("a.dat,{}\n", checksum)).unwrap();
    fs::write(state_dir.join("hash").join("cache.txt.version"), "2").unwrap();

    patchsync(&dir)
        .args(["cache", "show", "--state-dir"])
        .arg(&state_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains(checksum.as_str()))
        .stdout(predicate::str::contains("a.dat"));

    patchsync(&dir)
        .args(["cache", "clear", "--yes", "--state-dir"])
        .arg(&state_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared 1 cached checksums"));
    assert!(!cache_file(&state_dir).exists());
}

#[test]
fn test_status_and_show_keep_legacy_cache() {
    let dir = TempDir::new().unwrap();
    let state_dir = dir.path().join("Cache");
    fs::create_dir_all(state_dir.join("hash")).unwrap();
    fs::write(cache_file(&state_dir), format!("a.dat,{}\n", sha256_upper(b"alpha"))).unwrap();

    patchsync(&dir)
        .args(["status", "--json", "--state-dir"])
        .arg(&state_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"cached_entries\": 0"));

    patchsync(&dir)
        .args(["cache", "show", "--state-dir"])
        .arg(&state_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("empty"));

    assert!(cache_file(&state_dir).exists());
}

// ============================================================================
// Sync Tests
// ============================================================================

#[test]
fn test_sync_without_manifest_fails() {
    let dir = TempDir::new().unwrap();
    patchsync(&dir)
        .arg("sync")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("manifest"));
}

#[test]
fn test_sync_up_to_date_records_cache() {
    let dir = TempDir::new().unwrap();
    let alpha = b"alpha contents";
    let layout = layout(&dir, &format!("a.dat {} null\n", sha256_upper(alpha)));
    fs::write(layout.data_dir.join("a.dat"), alpha).unwrap();

    let mut cmd = patchsync(&dir);
    sync_args(&mut cmd, &layout)
        .assert()
        .success()
        .stdout(predicate::str::contains("up to date"));

    let cache = fs::read_to_string(cache_file(&layout.state_dir)).unwrap();
    assert!(cache.contains(&format!("a.dat,{}", sha256_upper(alpha))));
    assert!(!layout.state_dir.join("session").join("patching").exists());

    let log = fs::read_to_string(layout.state_dir.join("logs").join("patchsync.log")).unwrap();
    assert!(log.contains("Starting patch session"));
}

#[test]
fn test_sync_unreachable_file_exits_with_code_2() {
    let dir = TempDir::new().unwrap();
    let layout = layout(&dir, &format!("b.dat {} null\n", sha256_upper(b"beta")));

    let mut cmd = patchsync(&dir);
    sync_args(&mut cmd, &layout)
        .arg("--no-log-file")
        .assert()
        .code(2)
        .stdout(predicate::str::contains("Failed:"));

    assert!(!layout.data_dir.join("b.dat").exists());
    assert!(!layout.state_dir.join("session").join("patching").exists());
    assert!(!layout.state_dir.join("logs").join("patchsync.log").exists());
}

#[test]
fn test_sync_discards_interrupted_file() {
    let dir = TempDir::new().unwrap();
    let alpha = b"alpha contents";
    let layout = layout(&dir, &format!("a.dat {} null\n", sha256_upper(alpha)));
    fs::write(layout.data_dir.join("a.dat"), alpha).unwrap();
    fs::write(layout.data_dir.join("partial.pak"), b"half").unwrap();
    fs::create_dir_all(layout.state_dir.join("session")).unwrap();
    fs::write(layout.state_dir.join("session").join("patching"), "partial.pak").unwrap();

    let mut cmd = patchsync(&dir);
    sync_args(&mut cmd, &layout)
        .assert()
        .success()
        .stdout(predicate::str::contains("Discarded interrupted download of partial.pak"));

    assert!(!layout.data_dir.join("partial.pak").exists());
    assert!(layout.data_dir.join("a.dat").exists());
}

#[test]
fn test_sync_missing_local_manifest_still_finishes() {
    let dir = TempDir::new().unwrap();
    let layout = layout(&dir, "");
    fs::remove_file(&layout.manifest).unwrap();

    let mut cmd = patchsync(&dir);
    sync_args(&mut cmd, &layout)
        .arg("--no-log-file")
        .assert()
        .success()
        .stdout(predicate::str::contains("Unable to download patch list"));
}

//! Patchsync - keeps a local directory in sync with a checksum manifest
//!
//! # Usage
//!
//! ```bash
//! # Bring the data directory up to date
//! patchsync sync --manifest-url http://patch.example.com/plist.txt
//!
//! # Retry failed downloads from a mirror
//! patchsync sync --fallback-url http://mirror.example.com/Patch/Files/
//!
//! # Show cached checksums and any interrupted download
//! patchsync status
//! ```

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use clap_mangen::Man;
use console::style;
use patchsync_core::{SessionHandle, Settings};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing_subscriber::EnvFilter;

mod commands;
mod progress;

/// Patchsync - keeps a local directory in sync with a checksum manifest
#[derive(Parser)]
#[command(name = "patchsync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Suppress ALL output (implies --quiet and --yes)
    #[arg(long, global = true)]
    silent: bool,

    /// Use this configuration file instead of the default
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download every file whose checksum differs from the manifest
    Sync {
        /// Manifest URL or local path
        #[arg(long, env = "PATCHSYNC_MANIFEST_URL")]
        manifest_url: Option<String>,

        /// Base URL tried when a file's own link fails
        #[arg(long, value_name = "URL")]
        fallback_url: Option<String>,

        /// Directory holding the patched files
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Directory holding cache, recovery marker and logs
        #[arg(long)]
        state_dir: Option<PathBuf>,

        /// Re-hash each downloaded file and fail on mismatch
        #[arg(long)]
        verify: bool,

        /// Do not write the session log file
        #[arg(long)]
        no_log_file: bool,
    },

    /// Show cache and recovery state
    Status {
        /// Directory holding the patched files
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Directory holding cache, recovery marker and logs
        #[arg(long)]
        state_dir: Option<PathBuf>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Inspect or clear the checksum cache
    Cache {
        /// Directory holding cache, recovery marker and logs
        #[arg(long, global = true)]
        state_dir: Option<PathBuf>,

        #[command(subcommand)]
        action: CacheAction,
    },

    /// Print the SHA-256 checksum the cache would record for a file
    Hash {
        /// File to hash
        file: PathBuf,
    },

    /// Show or initialize the configuration file
    Config {
        /// Create a configuration file with default values
        #[arg(long)]
        init: bool,

        /// Print the configuration file path
        #[arg(long)]
        path: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Generate man pages
    Mangen {
        /// Output directory for man pages
        #[arg(short, long, default_value = ".")]
        out_dir: String,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached checksums
    Show {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Delete the cache so every file is hashed again
    Clear {
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

fn main() {
    // Set up panic handler for nicer error messages
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("{} {}", style("Error:").red().bold(), panic_info);
    }));

    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);

            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  {} {}", style("Caused by:").yellow(), cause);
                source = cause.source();
            }

            std::process::exit(1);
        }
    }
}

/// Run the selected command; `Ok(false)` means the sync session errored
fn run() -> Result<bool> {
    let cli = Cli::parse();

    let settings = Settings::load_from_path(cli.config.clone().or_else(Settings::config_path));

    // --silent implies --quiet (no logs at all, not even errors to tracing)
    let silent = cli.silent;
    let quiet = cli.quiet || silent || settings.behavior.quiet;
    let log_filter = if cli.verbose {
        "debug"
    } else if quiet {
        "off"
    } else {
        "info"
    };

    // The sync command installs its own subscriber with the session log file
    if !matches!(cli.command, Commands::Sync { .. }) {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(log_filter))
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr)
            .init();
    }

    let session_slot: Arc<OnceLock<SessionHandle>> = Arc::new(OnceLock::new());
    install_interrupt_handler(Arc::clone(&session_slot), silent)?;

    match cli.command {
        Commands::Sync {
            manifest_url,
            fallback_url,
            data_dir,
            state_dir,
            verify,
            no_log_file,
        } => commands::sync::execute(commands::sync::SyncArgs {
            settings,
            manifest_url,
            fallback_url,
            data_dir,
            state_dir,
            verify,
            no_log_file,
            log_filter,
            quiet,
            silent,
            session_slot,
        }),
        Commands::Status {
            data_dir,
            state_dir,
            json,
        } => {
            commands::status::execute(commands::status::StatusArgs {
                settings,
                config_file: cli.config,
                data_dir,
                state_dir,
                json,
                silent,
            })?;
            Ok(true)
        }
        Commands::Cache { state_dir, action } => {
            let state_dir = state_dir.unwrap_or_else(|| settings.paths.state_dir.clone());
            match action {
                CacheAction::Show { json } => commands::cache::show(&state_dir, json, silent)?,
                CacheAction::Clear { yes } => {
                    // --silent implies --yes
                    commands::cache::clear(&state_dir, yes || silent, silent)?
                }
            }
            Ok(true)
        }
        Commands::Hash { file } => {
            commands::hash::execute(&file, &settings, silent)?;
            Ok(true)
        }
        Commands::Config { init, path, json } => {
            commands::config::execute(commands::config::ConfigArgs {
                init,
                path,
                json,
                silent,
                config_file: cli.config,
            })?;
            Ok(true)
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut std::io::stdout());
            Ok(true)
        }
        Commands::Mangen { out_dir } => {
            generate_man_pages(&out_dir, silent)?;
            Ok(true)
        }
    }
}

/// Ctrl+C while patching warns first; a second press, or any press while
/// idle, exits with 130
fn install_interrupt_handler(session_slot: Arc<OnceLock<SessionHandle>>, silent: bool) -> Result<()> {
    let warned = AtomicBool::new(false);
    ctrlc::set_handler(move || {
        let patching = session_slot.get().is_some_and(SessionHandle::is_patching);
        if patching && !warned.swap(true, Ordering::SeqCst) {
            if !silent {
                eprintln!(
                    "\n{}",
                    style("Patching in progress. The file being downloaded will be discarded on the next sync. Press Ctrl+C again to exit").yellow()
                );
            }
            return;
        }
        if !silent {
            eprintln!("\n{}", style("Interrupted").red().bold());
        }
        std::process::exit(130);
    })?;
    Ok(())
}

fn generate_man_pages(out_dir: &str, silent: bool) -> Result<()> {
    let cmd = Cli::command();
    let out_path = std::path::Path::new(out_dir);
    std::fs::create_dir_all(out_path)?;

    let man = Man::new(cmd.clone());
    let mut buffer = Vec::new();
    man.render(&mut buffer)?;
    std::fs::write(out_path.join("patchsync.1"), buffer)?;
    if !silent {
        println!("Generated: {}/patchsync.1", out_dir);
    }

    for subcommand in cmd.get_subcommands() {
        let name = subcommand.get_name();
        if subcommand.is_hide_set() || name == "completions" || name == "mangen" || name == "help" {
            continue;
        }

        let man = Man::new(subcommand.clone());
        let mut buffer = Vec::new();
        man.render(&mut buffer)?;
        let filename = format!("patchsync-{}.1", name);
        std::fs::write(out_path.join(&filename), buffer)?;
        if !silent {
            println!("Generated: {}/{}", out_dir, filename);
        }
    }

    if !silent {
        println!(
            "\nInstall with: sudo cp {}/*.1 /usr/local/share/man/man1/",
            out_dir
        );
    }
    Ok(())
}

//! Session log file
//!
//! Installs the global `tracing` subscriber for a patch run:
//! - human-oriented console output filtered by the caller
//! - a log file truncated at the start of every session, one line per event
//!   in the form `<timestamp>: <message>`

use chrono::Local;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{Event, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Timestamp layout used in the session log
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Level written to the session log file
const FILE_FILTER: &str = "info";

/// Event format producing `<timestamp>: <message>` lines
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionLineFormat;

impl<S, N> FormatEvent<S, N> for SessionLineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(writer, "{}: ", Local::now().format(TIMESTAMP_FORMAT))?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Keeps the background log writer alive
///
/// Dropping this guard flushes and closes the log file.
#[derive(Debug)]
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Create the log file's directory and truncate the file
pub fn prepare_log_file(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, "")
}

/// Install console logging plus, when `log_file` is given, the session log
///
/// Fails if a global subscriber is already installed or the log file cannot
/// be prepared.
pub fn init_session_logging(
    log_file: Option<&Path>,
    console_filter: EnvFilter,
) -> crate::Result<LoggingGuard> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(console_filter);

    let Some(path) = log_file else {
        tracing_subscriber::registry()
            .with(console_layer)
            .try_init()
            .map_err(|e| crate::Error::InvalidConfig(format!("Logging already initialized: {}", e)))?;
        return Ok(LoggingGuard { _file_guard: None });
    };

    prepare_log_file(path)?;
    let directory = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| crate::Error::InvalidConfig(format!("Log path has no file name: {:?}", path)))?;

    let appender = tracing_appender::rolling::never(directory, file_name);
    let (file_writer, file_guard) = tracing_appender::non_blocking(appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .event_format(SessionLineFormat)
        .with_writer(file_writer)
        .with_ansi(false)
        .with_filter(EnvFilter::new(FILE_FILTER));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| crate::Error::InvalidConfig(format!("Logging already initialized: {}", e)))?;

    Ok(LoggingGuard {
        _file_guard: Some(file_guard),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[test]
    fn test_session_line_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.log");
        let file = fs::File::create(&path).unwrap();

        let subscriber = tracing_subscriber::fmt()
            .event_format(SessionLineFormat)
            .with_writer(Mutex::new(file))
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("Fetched a.dat from primary");
            tracing::warn!("Skipping manifest line 3");
        });

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let (stamp, message) = lines[0].split_once(": ").unwrap();
        assert_eq!(message, "Fetched a.dat from primary");
        assert!(chrono::NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).is_ok());
        assert!(lines[1].ends_with(": Skipping manifest line 3"));
    }

    #[test]
    fn test_prepare_log_file_truncates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("patchsync.log");

        prepare_log_file(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");

        fs::write(&path, "previous session\n").unwrap();
        prepare_log_file(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }
}

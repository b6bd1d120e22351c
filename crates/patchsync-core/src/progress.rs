//! Transfer progress math: percentage, throughput and ETA
//!
//! The transport only reports `(bytes_received, total_bytes)`. A
//! [`TransferMeter`] is started per download attempt and turns those into
//! the figures shown to the user.

use crate::hash::progress_percent;
use crate::transport::TransferProgress;
use std::time::{Duration, Instant};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Wall-clock state for one transfer attempt
#[derive(Debug, Clone, Copy)]
pub struct TransferMeter {
    started: Instant,
}

impl TransferMeter {
    /// Start timing now
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Derive display figures from the latest transport progress
    pub fn snapshot(&self, progress: TransferProgress) -> TransferSnapshot {
        TransferSnapshot::compute(progress, self.started.elapsed())
    }
}

/// Derived figures for one point in a transfer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferSnapshot {
    /// Percentage complete; 0 while the size is unknown
    pub percent: u8,
    /// Megabytes received
    pub downloaded_mb: f64,
    /// Total megabytes, when known
    pub total_mb: Option<f64>,
    /// Megabytes per second since the attempt started
    pub throughput_mbps: f64,
    /// Megabytes still to come, when known
    pub remaining_mb: Option<f64>,
    /// Estimated time left, when both size and throughput are known
    pub eta: Option<Duration>,
}

impl TransferSnapshot {
    /// Compute figures from progress and time elapsed since the attempt began
    pub fn compute(progress: TransferProgress, elapsed: Duration) -> Self {
        let downloaded_mb = progress.bytes_received as f64 / BYTES_PER_MB;
        let total_mb = progress.total_bytes.map(|t| t as f64 / BYTES_PER_MB);

        let secs = elapsed.as_secs_f64();
        let throughput_mbps = if secs > 0.0 { downloaded_mb / secs } else { 0.0 };

        let remaining_mb = total_mb.map(|total| (total - downloaded_mb).max(0.0));
        // A huge announced size at a trickle overflows Duration
        let eta = match remaining_mb {
            Some(remaining) if throughput_mbps > 0.0 => {
                Duration::try_from_secs_f64(remaining / throughput_mbps).ok()
            }
            _ => None,
        };

        let percent = match progress.total_bytes {
            Some(total) => progress_percent(progress.bytes_received, total),
            None => 0,
        };

        Self {
            percent,
            downloaded_mb,
            total_mb,
            throughput_mbps,
            remaining_mb,
            eta,
        }
    }

    /// Status line for file `index` (0-based) of `count`
    pub fn status_line(&self, index: usize, count: usize, filename: &str) -> String {
        let total = self
            .total_mb
            .map_or_else(|| "?".to_string(), |t| format!("{:.1}", t));
        let eta = self
            .eta
            .map_or_else(|| "unknown".to_string(), |d| format_eta(d.as_secs()));
        format!(
            "{}% (Patch {}/{} {}, downloaded {:.1}/{} MB at {:.1} MB/s, {} left)",
            self.percent,
            index + 1,
            count,
            filename,
            self.downloaded_mb,
            total,
            self.throughput_mbps,
            eta
        )
    }
}

/// Position of file `index` (0-based) within the whole queue, as a percentage
pub fn overall_percent(index: usize, count: usize) -> u8 {
    if count == 0 {
        return 100;
    }
    progress_percent(index as u64, count as u64)
}

/// Format an ETA as hours, minutes and seconds
pub fn format_eta(seconds: u64) -> String {
    let hours = seconds / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {:02}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Format bytes per second for display
pub fn format_speed(bytes_per_second: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes_per_second >= GB {
        format!("{:.1} GB/s", bytes_per_second as f64 / GB as f64)
    } else if bytes_per_second >= MB {
        format!("{:.1} MB/s", bytes_per_second as f64 / MB as f64)
    } else if bytes_per_second >= KB {
        format!("{:.1} KB/s", bytes_per_second as f64 / KB as f64)
    } else {
        format!("{} B/s", bytes_per_second)
    }
}

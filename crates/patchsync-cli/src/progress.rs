//! Terminal rendering of session events

use indicatif::{ProgressBar, ProgressStyle};
use patchsync_core::SessionObserver;
use std::time::Duration;

const BAR_TEMPLATE: &str = "  {spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {wide_msg}";

/// Drives an indicatif bar from session callbacks
pub struct TerminalObserver {
    bar: ProgressBar,
}

impl TerminalObserver {
    /// Create an observer; a hidden one draws nothing but still tracks state
    pub fn new(hidden: bool) -> Self {
        let bar = if hidden {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(100);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template(BAR_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("█▓░"),
            );
            bar
        };
        Self { bar }
    }
}

impl SessionObserver for TerminalObserver {
    fn on_progress_percent(&mut self, percent: u8) {
        self.bar.set_position(u64::from(percent));
    }

    fn on_status_text(&mut self, text: &str) {
        self.bar.set_message(text.to_string());
    }

    fn on_patching_state_changed(&mut self, patching: bool) {
        if patching {
            self.bar.enable_steady_tick(Duration::from_millis(120));
        } else {
            self.bar.disable_steady_tick();
        }
    }

    fn on_finished(&mut self) {
        self.bar.finish_and_clear();
    }

    fn on_error(&mut self, message: &str) {
        self.bar.abandon_with_message(message.to_string());
    }
}

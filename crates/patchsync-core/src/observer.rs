//! Callback interface between a session and whatever presents it
//!
//! The engine never touches a UI directly. A front end implements
//! [`SessionObserver`] and receives progress, status text and state changes.
//! Every method has an empty default so observers only override what they
//! render.

/// Receives session events
pub trait SessionObserver: Send {
    /// Progress of the current step, `0..=100`
    fn on_progress_percent(&mut self, _percent: u8) {}

    /// Human-readable status line
    fn on_status_text(&mut self, _text: &str) {}

    /// Patching started (`true`) or stopped (`false`)
    fn on_patching_state_changed(&mut self, _patching: bool) {}

    /// Session reached `Finished`
    fn on_finished(&mut self) {}

    /// Session reached `Errored`
    fn on_error(&mut self, _message: &str) {}
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Event recorded by [`RecordingObserver`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// `on_progress_percent`
    Progress(u8),
    /// `on_status_text`
    Status(String),
    /// `on_patching_state_changed`
    PatchingChanged(bool),
    /// `on_finished`
    Finished,
    /// `on_error`
    Error(String),
}

/// Observer that keeps every event in order
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    /// Events received so far
    pub events: Vec<SessionEvent>,
}

impl RecordingObserver {
    /// Status lines received so far
    pub fn statuses(&self) -> impl Iterator<Item = &str> {
        self.events.iter().filter_map(|e| match e {
            SessionEvent::Status(s) => Some(s.as_str()),
            _ => None,
        })
    }
}

impl SessionObserver for RecordingObserver {
    fn on_progress_percent(&mut self, percent: u8) {
        self.events.push(SessionEvent::Progress(percent));
    }

    fn on_status_text(&mut self, text: &str) {
        self.events.push(SessionEvent::Status(text.to_string()));
    }

    fn on_patching_state_changed(&mut self, patching: bool) {
        self.events.push(SessionEvent::PatchingChanged(patching));
    }

    fn on_finished(&mut self) {
        self.events.push(SessionEvent::Finished);
    }

    fn on_error(&mut self, message: &str) {
        self.events.push(SessionEvent::Error(message.to_string()));
    }
}

impl<O: SessionObserver + ?Sized> SessionObserver for &mut O {
    fn on_progress_percent(&mut self, percent: u8) {
        (**self).on_progress_percent(percent);
    }

    fn on_status_text(&mut self, text: &str) {
        (**self).on_status_text(text);
    }

    fn on_patching_state_changed(&mut self, patching: bool) {
        (**self).on_patching_state_changed(patching);
    }

    fn on_finished(&mut self) {
        (**self).on_finished();
    }

    fn on_error(&mut self, message: &str) {
        (**self).on_error(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_observer_keeps_order() {
        let mut observer = RecordingObserver::default();
        observer.on_patching_state_changed(true);
        observer.on_progress_percent(10);
        observer.on_status_text("Checking 1/2 a.dat");
        observer.on_finished();

        assert_eq!(
            observer.events,
            vec![
                SessionEvent::PatchingChanged(true),
                SessionEvent::Progress(10),
                SessionEvent::Status("Checking 1/2 a.dat".to_string()),
                SessionEvent::Finished,
            ]
        );
        assert_eq!(observer.statuses().collect::<Vec<_>>(), vec!["Checking 1/2 a.dat"]);
    }

    #[test]
    fn test_mut_ref_forwards() {
        fn emit<O: SessionObserver>(mut observer: O) {
            observer.on_error("boom");
        }

        let mut inner = RecordingObserver::default();
        emit(&mut inner);
        assert_eq!(inner.events, vec![SessionEvent::Error("boom".to_string())]);
    }

    #[test]
    fn test_noop_observer_accepts_everything() {
        let mut observer = NoopObserver;
        observer.on_progress_percent(50);
        observer.on_status_text("ignored");
        observer.on_patching_state_changed(false);
        observer.on_finished();
        observer.on_error("ignored");
    }
}

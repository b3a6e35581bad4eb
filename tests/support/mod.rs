//! Shared helpers for integration tests.

use std::sync::{Mutex, PoisonError};

use scribble_dl_core::{Level, Reporter};

/// [`Reporter`] double recording every call for assertions.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    statuses: Mutex<Vec<(String, Level)>>,
    details: Mutex<Vec<(Option<String>, Level)>>,
    progress: Mutex<Vec<Option<String>>>,
    events: Mutex<Vec<(String, Level)>>,
}

#[allow(dead_code)] // not every test file uses every accessor
impl RecordingReporter {
    pub fn statuses(&self) -> Vec<(String, Level)> {
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn details(&self) -> Vec<(Option<String>, Level)> {
        self.details
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.details()
            .into_iter()
            .filter_map(|(text, level)| match (text, level) {
                (Some(text), Level::Warning) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn progress(&self) -> Vec<Option<String>> {
        self.progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn events(&self) -> Vec<(String, Level)> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Reporter for RecordingReporter {
    fn update_status(&self, message: &str, level: Level) {
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((message.to_string(), level));
    }

    fn update_detail(&self, message: Option<&str>, level: Level) {
        self.details
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((message.map(ToString::to_string), level));
    }

    fn update_progress(&self, message: Option<&str>) {
        self.progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.map(ToString::to_string));
    }

    fn log_event(&self, message: &str, level: Level) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((message.to_string(), level));
    }

    fn finalize(&self) {}
}

//! Shared helpers for unit tests.
//!
//! Compiled only under `cfg(test)`. The integration tests carry their own
//! copy of the recording reporter under `tests/support/`.

use std::sync::{Mutex, PoisonError};

use crate::report::{Level, Reporter};

/// [`Reporter`] double that records every call for later assertions instead
/// of drawing anything.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    statuses: Mutex<Vec<(String, Level)>>,
    details: Mutex<Vec<(Option<String>, Level)>>,
    progress: Mutex<Vec<Option<String>>>,
    events: Mutex<Vec<(String, Level)>>,
    finalized: Mutex<u32>,
}

impl RecordingReporter {
    /// Every status update, in order.
    pub fn statuses(&self) -> Vec<(String, Level)> {
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every detail update, in order, including `None` clears.
    pub fn details(&self) -> Vec<(Option<String>, Level)> {
        self.details
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Detail texts that were set at warning level.
    pub fn warnings(&self) -> Vec<String> {
        self.details()
            .into_iter()
            .filter_map(|(text, level)| match (text, level) {
                (Some(text), Level::Warning) => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Every progress update, in order, including `None` clears.
    pub fn progress(&self) -> Vec<Option<String>> {
        self.progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every discrete log event, in order.
    pub fn events(&self) -> Vec<(String, Level)> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How many times `finalize` was called.
    pub fn finalize_count(&self) -> u32 {
        *self.finalized.lock().unwrap_or_else(PoisonError::into_inner)
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

    fn finalize(&self) {
        *self.finalized.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }
}

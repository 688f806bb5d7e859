use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{LockResultExt, TaggerError};

/// Fire-and-forget destination for caught source failures.
pub trait ErrorSink: Send + Sync {
    fn report(&self, error: &TaggerError);
}

/// Logs every report at error level.
#[derive(Debug, Default)]
pub struct LogErrorSink {
    reported: AtomicUsize,
}

impl LogErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report_count(&self) -> usize {
        self.reported.load(Ordering::Relaxed)
    }
}

impl ErrorSink for LogErrorSink {
    fn report(&self, error: &TaggerError) {
        self.reported.fetch_add(1, Ordering::Relaxed);
        log::error!(target: "async_tagger::errors", "{}", error);
    }
}

/// Keeps the rendered messages of every report.
#[derive(Debug, Default)]
pub struct RecordingErrorSink {
    messages: Mutex<Vec<String>>,
}

impl RecordingErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .recover_poison("RecordingErrorSink::messages")
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }
}

impl ErrorSink for RecordingErrorSink {
    fn report(&self, error: &TaggerError) {
        if let Ok(mut messages) = self
            .messages
            .lock()
            .recover_poison("RecordingErrorSink::report")
        {
            messages.push(error.to_string());
        }
    }
}

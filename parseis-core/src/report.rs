//! The per-group status report.
//!
//! Every rank of a process group shares one [`Report`]. Subsystems append
//! entries as they work; an `Error` entry sets a sticky flag that the
//! communicator's `assert_ok` turns into a collective failure. Entries are
//! mirrored to the `log` facade so a consuming application sees them live.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// The severity of a report entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Info,
    Warning,
    Error,
}

/// One recorded entry.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub status: Status,
    pub message: String,
}

/// An append-only log with a sticky error flag.
#[derive(Debug, Default)]
pub struct Report {
    entries: Mutex<Vec<LogEntry>>,
    failed: AtomicBool,
}

impl Report {
    pub fn new() -> Self {
        Report {
            entries: Mutex::new(Vec::new()),
            failed: AtomicBool::new(false),
        }
    }

    /// Record an entry. An `Error` entry makes the report (and hence the
    /// whole group) permanently failed.
    pub fn add<M: Into<String>>(&self, status: Status, message: M) {
        let message = message.into();
        match status {
            Status::Info => log::info!("{}", message),
            Status::Warning => log::warn!("{}", message),
            Status::Error => {
                log::error!("{}", message);
                self.failed.store(true, Ordering::SeqCst);
            }
        }
        let mut entries = self.entries.lock().expect("report mutex poisoned");
        entries.push(LogEntry { status, message });
    }

    /// Has any `Error` entry been recorded?
    pub fn has_error(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// A snapshot of all entries recorded so far.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().expect("report mutex poisoned").clone()
    }

    /// The messages of all `Error` entries recorded so far.
    pub fn error_messages(&self) -> Vec<String> {
        self.entries
            .lock()
            .expect("report mutex poisoned")
            .iter()
            .filter(|e| e.status == Status::Error)
            .map(|e| e.message.clone())
            .collect()
    }
}

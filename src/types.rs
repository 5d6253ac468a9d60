use serde::Serialize;
use std::path::PathBuf;

/// Status of a file as reported by the version-control tool.
///
/// Only `Modified` is produced by the status parser; the other variants are
/// skipped by the formatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModifiedFileEntry {
    pub path: PathBuf,
    pub status: FileStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// A user-facing outcome of one triggered action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.level == NotificationLevel::Error
    }
}

/// Outcome of a single formatter invocation handed to a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed off without a completion signal.
    Sent,
    Completed,
    /// The command ran and exited unsuccessfully. `code` is `None` when it was
    /// terminated by a signal.
    Failed { code: Option<i32> },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FormatReport {
    pub formatted: usize,
    pub failed: Vec<PathBuf>,
}

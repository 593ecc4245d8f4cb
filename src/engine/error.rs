//! Engine error types.

use std::path::PathBuf;

/// Errors that can occur while tailing the game client's logs.
///
/// Everything except watcher registration is transient: the engine logs it,
/// leaves its offsets untouched and catches up on the next notification.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// A watched log file is missing (not written yet, or deleted).
    #[error("Log file missing: {0}")]
    FileMissing(PathBuf),

    /// Permission denied while opening a log file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// A marker regex failed to compile.
    #[error("Invalid marker pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Notify watcher error.
    #[error("File watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

//! Session folder selection.
//!
//! The game client rotates its logs into a fresh subdirectory per run;
//! the newest one by creation time is the live session.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// One rotation period of the game client's logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    path: PathBuf,
    created: SystemTime,
}

impl Session {
    /// Build a session from an existing directory, reading its creation time.
    ///
    /// Returns `None` if the path is not a readable directory. Filesystems
    /// without birth-time support fall back to the modification time.
    #[must_use]
    pub fn at(path: &Path) -> Option<Self> {
        let metadata = std::fs::metadata(path).ok()?;
        if !metadata.is_dir() {
            return None;
        }
        let created = metadata.created().or_else(|_| metadata.modified()).ok()?;
        Some(Self {
            path: path.to_path_buf(),
            created,
        })
    }

    /// Directory holding this session's log files.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creation time of the session directory.
    #[must_use]
    pub fn created(&self) -> SystemTime {
        self.created
    }

    /// Whether this session strictly supersedes `current`.
    ///
    /// Ties keep the incumbent, so two directories sharing a creation
    /// timestamp never flap.
    #[must_use]
    pub fn supersedes(&self, current: &Self) -> bool {
        self.created > current.created
    }
}

/// Find the current session: the newest immediate subdirectory of `root`.
///
/// A missing or empty root is not an error, it means there is nothing to
/// watch yet.
#[must_use]
pub fn current_session(root: &Path) -> Option<Session> {
    let entries = std::fs::read_dir(root).ok()?;

    entries
        .filter_map(Result::ok)
        .filter_map(|entry| Session::at(&entry.path()))
        .max_by_key(Session::created)
}

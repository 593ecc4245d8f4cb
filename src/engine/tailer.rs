//! Incremental log file tailer.
//!
//! Reads newly appended bytes from a log file on each notification,
//! surfacing complete lines only. The game client flushes records lazily, so
//! a read routinely ends mid-line; those trailing bytes are held back and
//! prepended to the next read.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::error::EngineError;

/// Outcome of one read pass over a watched file.
#[derive(Debug, Default)]
pub struct TailRead {
    /// Complete lines consumed during this pass, in file order.
    pub lines: Vec<String>,
    /// The file shrank below the stored offset and was re-read from the
    /// start. Callers must drop any per-stream parse state.
    pub truncated: bool,
}

/// Incremental reader that tracks a byte offset into one log file.
///
/// The offset only ever advances within an engine lifetime; the two
/// exceptions are a truncation resync and a re-bind to a different path,
/// both of which mean the old file identity is gone.
#[derive(Debug, Default)]
pub struct TailReader {
    /// Path of the file the offset refers to.
    path: Option<PathBuf>,
    /// Byte position up to which the file has been consumed.
    offset: u64,
    /// Bytes after the last newline seen so far.
    pending: Vec<u8>,
}

impl TailReader {
    /// Create a reader with no file bound yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current byte offset.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read from the stored offset to the current end of file.
    ///
    /// The file is opened for shared read access on every call, so a writer
    /// keeping it open is fine. Redundant notifications are harmless: with
    /// no new bytes the result is empty and the offset does not move.
    ///
    /// # Errors
    ///
    /// Returns `FileMissing` / `PermissionDenied` / `Io` when the file
    /// cannot be opened or read. The offset is left unchanged so the next
    /// successful read catches up from the same point.
    pub async fn read_new_lines(&mut self, path: &Path) -> Result<TailRead, EngineError> {
        if self.path.as_deref() != Some(path) {
            // Notification for a different file than the one our offset
            // refers to: treat it as a fresh file.
            if self.path.is_some() {
                tracing::debug!(path = %path.display(), "re-binding tail reader");
            }
            self.path = Some(path.to_path_buf());
            self.offset = 0;
            self.pending.clear();
        }

        let mut file = match File::open(path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(EngineError::FileMissing(path.to_path_buf()));
            }
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(EngineError::PermissionDenied(path.to_path_buf()));
            }
            Err(e) => return Err(EngineError::Io(e)),
        };

        let mut result = TailRead::default();

        let file_len = file.metadata().await?.len();
        if file_len < self.offset {
            tracing::warn!(
                path = %path.display(),
                old_offset = self.offset,
                new_len = file_len,
                "log file shrank, resetting offset to 0"
            );
            self.offset = 0;
            self.pending.clear();
            result.truncated = true;
        }

        if file_len == self.offset {
            return Ok(result);
        }

        file.seek(std::io::SeekFrom::Start(self.offset)).await?;

        let mut buf = Vec::new();
        file.read_to_end(&mut buf).await?;

        // The actual stream position, not offset + file_len: the file may
        // have grown again while we were reading.
        self.offset = file.stream_position().await?;

        let mut data = std::mem::take(&mut self.pending);
        data.extend_from_slice(&buf);

        let mut start = 0;
        for (i, byte) in data.iter().enumerate() {
            if *byte == b'\n' {
                let mut line = &data[start..i];
                if line.last() == Some(&b'\r') {
                    line = &line[..line.len() - 1];
                }
                result.lines.push(String::from_utf8_lossy(line).into_owned());
                start = i + 1;
            }
        }
        self.pending = data[start..].to_vec();

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn append(path: &Path, data: &str) {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(data.as_bytes()).unwrap();
        file.flush().unwrap();
    }

    #[tokio::test]
    async fn test_reads_initial_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("application.log");
        append(&path, "line one\nline two\n");

        let mut reader = TailReader::new();
        let read = reader.read_new_lines(&path).await.unwrap();

        assert_eq!(read.lines, vec!["line one", "line two"]);
        assert!(!read.truncated);
        assert_eq!(reader.offset(), 18);
    }

    #[tokio::test]
    async fn test_reads_only_new_lines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("application.log");
        append(&path, "first\n");

        let mut reader = TailReader::new();
        let read = reader.read_new_lines(&path).await.unwrap();
        assert_eq!(read.lines, vec!["first"]);
        let offset = reader.offset();

        append(&path, "second\n");
        let read = reader.read_new_lines(&path).await.unwrap();
        assert_eq!(read.lines, vec!["second"]);
        assert!(reader.offset() > offset);
    }

    #[tokio::test]
    async fn test_redundant_notification_is_a_no_op() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("application.log");
        append(&path, "only line\n");

        let mut reader = TailReader::new();
        reader.read_new_lines(&path).await.unwrap();
        let offset = reader.offset();

        // Same notification again, no file growth.
        let read = reader.read_new_lines(&path).await.unwrap();
        assert!(read.lines.is_empty());
        assert_eq!(reader.offset(), offset);
    }

    #[tokio::test]
    async fn test_partial_line_held_back_until_terminated() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("application.log");
        append(&path, "complete\nparti");

        let mut reader = TailReader::new();
        let read = reader.read_new_lines(&path).await.unwrap();
        assert_eq!(read.lines, vec!["complete"]);
        // Offset still covers the partial bytes.
        assert_eq!(reader.offset(), 14);

        append(&path, "al done\n");
        let read = reader.read_new_lines(&path).await.unwrap();
        assert_eq!(read.lines, vec!["partial done"]);
    }

    #[tokio::test]
    async fn test_offset_is_monotonic_across_reads() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("application.log");

        let mut reader = TailReader::new();
        let mut last_offset = 0;
        for i in 0..5 {
            append(&path, &format!("line {i}\n"));
            reader.read_new_lines(&path).await.unwrap();
            assert!(reader.offset() >= last_offset);
            last_offset = reader.offset();
        }
    }

    #[tokio::test]
    async fn test_truncation_resets_to_start() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("application.log");
        append(&path, "old content line\nmore old content\n");

        let mut reader = TailReader::new();
        reader.read_new_lines(&path).await.unwrap();

        // Replace with shorter content.
        std::fs::write(&path, "fresh\n").unwrap();

        let read = reader.read_new_lines(&path).await.unwrap();
        assert!(read.truncated);
        assert_eq!(read.lines, vec!["fresh"]);
        assert_eq!(reader.offset(), 6);
    }

    #[tokio::test]
    async fn test_truncation_discards_pending_partial_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("application.log");
        append(&path, "complete\ndangling");

        let mut reader = TailReader::new();
        reader.read_new_lines(&path).await.unwrap();

        std::fs::write(&path, "new\n").unwrap();

        let read = reader.read_new_lines(&path).await.unwrap();
        assert!(read.truncated);
        // The dangling bytes must not contaminate the fresh file's lines.
        assert_eq!(read.lines, vec!["new"]);
    }

    #[tokio::test]
    async fn test_missing_file_leaves_offset_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("application.log");
        append(&path, "one\n");

        let mut reader = TailReader::new();
        reader.read_new_lines(&path).await.unwrap();
        let offset = reader.offset();

        std::fs::remove_file(&path).unwrap();
        let result = reader.read_new_lines(&path).await;
        assert!(matches!(result, Err(EngineError::FileMissing(_))));
        assert_eq!(reader.offset(), offset);
    }

    #[tokio::test]
    async fn test_rebind_to_different_path_starts_fresh() {
        let temp_dir = TempDir::new().unwrap();
        let first = temp_dir.path().join("2025_application.log");
        let second = temp_dir.path().join("2026_application.log");
        append(&first, "from the first file\n");
        append(&second, "from the second file\n");

        let mut reader = TailReader::new();
        reader.read_new_lines(&first).await.unwrap();

        let read = reader.read_new_lines(&second).await.unwrap();
        assert_eq!(read.lines, vec!["from the second file"]);
    }

    #[tokio::test]
    async fn test_crlf_terminators_are_trimmed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("application.log");
        append(&path, "windows line\r\nplain line\n");

        let mut reader = TailReader::new();
        let read = reader.read_new_lines(&path).await.unwrap();
        assert_eq!(read.lines, vec!["windows line", "plain line"]);
    }
}

//! Engine orchestration.
//!
//! Wires a session folder's log files to notifiers, tail readers and
//! extractors, and retargets the whole arrangement when the game client
//! rotates to a new session directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::error::EngineError;
use super::event::EventSink;
use super::extractor::EventExtractor;
use super::gate::BacklogGate;
use super::notifier::{FileChangeNotifier, FsEvent, WatchFilter};
use super::session::{self, Session};
use super::tailer::TailReader;

/// Log file name suffixes tailed inside each session folder.
const WATCHED_SUFFIXES: [&str; 2] = ["application.log", "notifications.log"];

/// Follows the game client's rotating log directories and feeds extracted
/// events to an injected sink.
///
/// Offsets and gate state live in memory only; a fresh run re-scans the
/// current session from the start with emission suppressed.
pub struct TailEngine {
    root: PathBuf,
    sink: Arc<dyn EventSink>,
    gate: Arc<BacklogGate>,
    running: Option<EngineHandle>,
}

struct EngineHandle {
    cancel: CancellationToken,
    supervisor: JoinHandle<()>,
}

impl TailEngine {
    /// Create an engine rooted at the client's `Logs` directory.
    pub fn new(root: impl Into<PathBuf>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            root: root.into(),
            sink,
            gate: Arc::new(BacklogGate::new(WATCHED_SUFFIXES.len())),
            running: None,
        }
    }

    /// Logs root this engine watches.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start tailing. No-op if already running.
    ///
    /// A missing logs root is not an error: the engine stays idle and a
    /// later [`restart`](Self::restart) attaches once the directory exists.
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if a file watcher cannot be registered or a marker
    /// pattern fails to compile.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.running.is_some() {
            return Ok(());
        }

        self.gate.reset();

        if !self.root.is_dir() {
            tracing::info!(root = %self.root.display(), "logs root missing, engine idle");
            return Ok(());
        }

        let (root_notifier, root_rx) =
            FileChangeNotifier::start(&self.root, WatchFilter::Subdirectory)?;

        let cancel = CancellationToken::new();
        let current = session::current_session(&self.root);

        let watch = match &current {
            Some(session) => {
                tracing::info!(session = %session.path().display(), "tailing session folder");
                Some(wire_session(
                    session.path(),
                    &self.gate,
                    &self.sink,
                    &cancel,
                )?)
            }
            None => {
                tracing::info!(root = %self.root.display(), "no session folder yet");
                None
            }
        };

        let supervisor = tokio::spawn(supervise(
            root_notifier,
            root_rx,
            current,
            watch,
            Arc::clone(&self.gate),
            Arc::clone(&self.sink),
            cancel.clone(),
        ));

        self.running = Some(EngineHandle { cancel, supervisor });
        Ok(())
    }

    /// Stop tailing and release all watchers.
    ///
    /// When this returns, no notifier callback is in flight and none will
    /// fire again. Safe to call while already stopped.
    pub async fn stop(&mut self) {
        if let Some(handle) = self.running.take() {
            handle.cancel.cancel();
            let _ = handle.supervisor.await;
            tracing::info!("tail engine stopped");
        }
    }

    /// Stop and start again, re-resolving the current session folder.
    ///
    /// # Errors
    ///
    /// Same as [`start`](Self::start).
    pub async fn restart(&mut self) -> Result<(), EngineError> {
        self.stop().await;
        self.start()
    }

    /// Whether the engine currently has watchers attached. False while
    /// idling because the logs root does not exist yet.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }
}

/// Per-session wiring: one notifier and one worker task per watched suffix.
struct SessionWatch {
    notifiers: Vec<FileChangeNotifier>,
    workers: Vec<JoinHandle<()>>,
}

impl SessionWatch {
    /// Tear down in order: deregister notifiers first so no further events
    /// are queued, then wait for the workers to drain and exit.
    async fn shutdown(mut self) {
        for notifier in &mut self.notifiers {
            notifier.stop();
        }
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

fn wire_session(
    dir: &Path,
    gate: &Arc<BacklogGate>,
    sink: &Arc<dyn EventSink>,
    cancel: &CancellationToken,
) -> Result<SessionWatch, EngineError> {
    let mut notifiers = Vec::new();
    let mut workers = Vec::new();

    for suffix in WATCHED_SUFFIXES {
        let filter = WatchFilter::file_suffix(suffix);
        let (notifier, rx) = FileChangeNotifier::start(dir, filter.clone())?;
        let extractor = EventExtractor::new()?;
        let initial = find_log_file(dir, &filter);

        notifiers.push(notifier);
        workers.push(tokio::spawn(file_worker(
            rx,
            initial,
            extractor,
            Arc::clone(gate),
            Arc::clone(sink),
            cancel.child_token(),
        )));
    }

    Ok(SessionWatch { notifiers, workers })
}

/// Newest file in `dir` accepted by the filter, by modification time.
fn find_log_file(dir: &Path, filter: &WatchFilter) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;

    entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && filter.matches(path))
        .filter_map(|path| {
            let modified = std::fs::metadata(&path).ok()?.modified().ok()?;
            Some((path, modified))
        })
        .max_by_key(|(_, modified)| *modified)
        .map(|(path, _)| path)
}

/// Reacts to new session directories appearing under the logs root.
async fn supervise(
    mut root_notifier: FileChangeNotifier,
    mut root_rx: mpsc::UnboundedReceiver<FsEvent>,
    mut current: Option<Session>,
    mut watch: Option<SessionWatch>,
    gate: Arc<BacklogGate>,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            event = root_rx.recv() => {
                let Some(event) = event else { break };
                if let FsEvent::Created(path) = event {
                    let Some(candidate) = Session::at(&path) else {
                        continue;
                    };
                    let newer = match &current {
                        Some(session) => candidate.supersedes(session),
                        None => true,
                    };
                    if !newer {
                        continue;
                    }

                    tracing::info!(
                        session = %candidate.path().display(),
                        "switching to newer session folder"
                    );
                    if let Some(old) = watch.take() {
                        old.shutdown().await;
                    }
                    // The gate stays as it is: by the time a rotation
                    // happens the engine is live, and the new files start
                    // empty.
                    match wire_session(candidate.path(), &gate, &sink, &cancel) {
                        Ok(new_watch) => {
                            watch = Some(new_watch);
                            current = Some(candidate);
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to watch new session folder");
                        }
                    }
                }
            }
        }
    }

    root_notifier.stop();
    if let Some(watch) = watch.take() {
        watch.shutdown().await;
    }
}

/// Owns one watched file's read and parse state; consumes its notification
/// channel alone, which serializes all offset mutation for that file.
async fn file_worker(
    mut notifications: mpsc::UnboundedReceiver<FsEvent>,
    initial: Option<PathBuf>,
    mut extractor: EventExtractor,
    gate: Arc<BacklogGate>,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
) {
    let mut tailer = TailReader::new();

    // First pass: scan whatever is already on disk so offsets land at EOF
    // without emitting stale events. A suffix with no file yet has no
    // backlog to suppress, so it counts as scanned right away.
    if let Some(path) = &initial {
        process_file(path, &mut tailer, &mut extractor, &gate, sink.as_ref()).await;
    }
    gate.mark_file_pass_complete();

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            event = notifications.recv() => {
                let Some(event) = event else { break };
                process_file(
                    event.path(),
                    &mut tailer,
                    &mut extractor,
                    &gate,
                    sink.as_ref(),
                )
                .await;
            }
        }
    }
}

/// One read pass: pull new complete lines, classify them in order, forward
/// events when the gate is open.
async fn process_file(
    path: &Path,
    tailer: &mut TailReader,
    extractor: &mut EventExtractor,
    gate: &BacklogGate,
    sink: &dyn EventSink,
) {
    let read = match tailer.read_new_lines(path).await {
        Ok(read) => read,
        Err(e) => {
            // Transient: locked, vanished, or mid-replacement. Offset is
            // untouched, so the next notification catches up.
            tracing::debug!(path = %path.display(), error = %e, "skipping log read");
            return;
        }
    };

    if read.truncated {
        extractor.reset();
    }

    for line in &read.lines {
        for event in extractor.push_line(line) {
            if gate.should_emit() {
                tracing::debug!(?event, "extracted event");
                event.dispatch(sink);
            } else {
                tracing::trace!(?event, "suppressed during initial scan");
            }
        }
    }
}

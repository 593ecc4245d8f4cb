//! Log-tail and event-extraction engine.
//!
//! Follows the game client's rotating session log folders and turns raw log
//! lines into typed events, delivered in file order to an injected sink.

mod error;
mod event;
mod extractor;
mod gate;
mod notifier;
mod session;
mod tail_engine;
mod tailer;

pub use error::EngineError;
pub use event::{Event, EventSink};
pub use extractor::EventExtractor;
pub use gate::BacklogGate;
pub use notifier::{FileChangeNotifier, FsEvent, WatchFilter};
pub use session::{current_session, Session};
pub use tail_engine::TailEngine;
pub use tailer::{TailRead, TailReader};

//! Domain events extracted from the game client's logs.

/// A typed event extracted from a log line.
///
/// Events are plain values: once handed to a sink they carry no reference
/// back into the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The client loaded into a new map. The token is the raw location name
    /// from the log, lowercased (e.g. `factory`).
    MapChanged {
        /// Raw location token, lowercased.
        location: String,
    },
    /// A quest changed status (started, success, fail).
    QuestStatusChanged {
        /// Quest template identifier.
        quest_id: String,
        /// Status string as logged by the client (e.g. `success`).
        status: String,
    },
    /// The client finished initializing (session boundary, used by
    /// collaborators for housekeeping rather than game state).
    ClientReady,
}

/// Consumer of extracted events, injected into the engine.
///
/// Each callback is invoked at most once per extracted event, never twice
/// for the same physical log line within one engine run (a truncation resync
/// is a legitimate re-delivery: the file identity effectively changed).
pub trait EventSink: Send + Sync {
    /// The client loaded into a new map.
    fn on_map_changed(&self, location: &str);
    /// A quest changed status.
    fn on_quest_status_changed(&self, quest_id: &str, status: &str);
    /// The client finished initializing.
    fn on_client_ready(&self);
}

impl Event {
    /// Deliver this event through the matching sink callback.
    pub fn dispatch(&self, sink: &dyn EventSink) {
        match self {
            Self::MapChanged { location } => sink.on_map_changed(location),
            Self::QuestStatusChanged { quest_id, status } => {
                sink.on_quest_status_changed(quest_id, status);
            }
            Self::ClientReady => sink.on_client_ready(),
        }
    }
}

//! Log line classification.
//!
//! Each complete line is matched against a small set of fixed markers from
//! the game client's log format. Most records are single lines; the chat
//! notification record carries a JSON object spanning several lines, ended
//! only by the next line that starts with a timestamp. That accumulation is
//! an explicit two-state machine so the no-finalize-on-EOF rule stays
//! visible.

use regex::Regex;
use serde::Deserialize;

use super::error::EngineError;
use super::event::Event;

/// PvP raid start record in `*application.log`.
const PVP_LOCATION_MARKER: &str = "application|TRACE-NetworkGameCreate profileStatus";
/// PvE raid start record in `*application.log` (scene preset load).
const PVE_LOCATION_MARKER: &str = "application|scene preset";
/// BattlEye initialization, marks the client becoming ready.
const CLIENT_READY_MARKER: &str = "BEClient inited successfully";
/// Chat notification record in `*notifications.log`; the JSON payload
/// follows on subsequent lines.
const NOTIFICATION_MARKER: &str = "push-notifications|Got notification | ChatMessageReceived";

/// Multi-line accumulation state for the notification payload.
#[derive(Debug)]
enum AccumState {
    Idle,
    Accumulating { buffer: String },
}

/// Notification payload shape: `{"message":{"type":...,"templateId":...}}`.
#[derive(Debug, Deserialize)]
struct NotificationRecord {
    message: NotificationMessage,
}

#[derive(Debug, Deserialize)]
struct NotificationMessage {
    #[serde(rename = "type")]
    kind: String,
    /// Compound field, e.g. `"6574e0dedc0d635f633a5805 successMessageText"`;
    /// the quest id is the part before the first space.
    #[serde(rename = "templateId")]
    template_id: String,
}

/// Classifies complete log lines into domain events.
///
/// Stateful: one extractor per tailed file, fed lines strictly in file
/// order.
#[derive(Debug)]
pub struct EventExtractor {
    pvp_location: Regex,
    pve_location: Regex,
    record_start: Regex,
    state: AccumState,
}

impl EventExtractor {
    /// Create an extractor with the fixed marker patterns compiled.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Pattern` if a marker regex fails to compile.
    pub fn new() -> Result<Self, EngineError> {
        Ok(Self {
            pvp_location: Regex::new(r"(?i)location:\s*(\S+),")?,
            pve_location: Regex::new(r"(?i)path:maps/(\w+)\.bundle")?,
            // Every fresh log record starts with a local timestamp; hour,
            // minute and second may be one or two digits.
            record_start: Regex::new(r"^\d{4}-\d{2}-\d{2} \d{1,2}:\d{1,2}:\d{1,2}\.\d{3}")?,
            state: AccumState::Idle,
        })
    }

    /// Feed one complete line, in file order.
    ///
    /// Usually yields zero or one event. Two are possible when a line both
    /// terminates an accumulated notification payload and classifies on its
    /// own: the boundary line belongs to the next record, so it is
    /// re-examined after the payload is finalized.
    pub fn push_line(&mut self, line: &str) -> Vec<Event> {
        let mut events = Vec::new();

        if let AccumState::Accumulating { buffer } = &mut self.state {
            if self.record_start.is_match(line) {
                let payload = std::mem::take(buffer);
                self.state = AccumState::Idle;
                if let Some(event) = parse_quest_notification(&payload) {
                    events.push(event);
                }
                // Fall through: the boundary line classifies on its own.
            } else {
                buffer.push_str(line);
                buffer.push('\n');
                return events;
            }
        }

        if let Some(event) = self.classify(line) {
            events.push(event);
        }
        events
    }

    /// Drop any in-progress accumulation. Called when the underlying file's
    /// identity changes (truncation resync).
    pub fn reset(&mut self) {
        self.state = AccumState::Idle;
    }

    fn classify(&mut self, line: &str) -> Option<Event> {
        if line.contains(PVP_LOCATION_MARKER) {
            return capture_location(&self.pvp_location, line);
        }
        if line.contains(PVE_LOCATION_MARKER) {
            return capture_location(&self.pve_location, line);
        }
        if line.contains(CLIENT_READY_MARKER) {
            return Some(Event::ClientReady);
        }
        if line.contains(NOTIFICATION_MARKER) {
            // The JSON payload starts on the next line. If the read pass
            // ends before the next dated line shows up, we stay in this
            // state: the writer simply hasn't flushed the whole record yet.
            self.state = AccumState::Accumulating {
                buffer: String::new(),
            };
        }
        None
    }
}

fn capture_location(re: &Regex, line: &str) -> Option<Event> {
    let token = re.captures(line)?.get(1)?.as_str().to_lowercase();
    Some(Event::MapChanged { location: token })
}

/// Parse an accumulated notification payload. Malformed or incomplete JSON
/// and missing fields yield nothing; the record is simply dropped.
fn parse_quest_notification(payload: &str) -> Option<Event> {
    let record: NotificationRecord = serde_json::from_str(payload).ok()?;

    let quest_id = record
        .message
        .template_id
        .split(' ')
        .next()
        .filter(|id| !id.is_empty())?;

    Some(Event::QuestStatusChanged {
        quest_id: quest_id.to_string(),
        status: record.message.kind,
    })
}

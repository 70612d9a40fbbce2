use std::sync::{Arc, Mutex};

use treesync::{
    Document, Element, Session,
    events::EventBus,
    sync::{Client, ClientConfig, PollConfig, transports::ScriptedTransport},
};

/// A `Team(id)` element with a `Score` child.
pub fn team(id: &str, score: &str) -> Element {
    Element::new("Team")
        .with_id(id)
        .with_child(Element::new("Score").with_value(Some(score)))
}

/// A document holding the given top-level elements.
pub fn document(elements: impl IntoIterator<Item = Element>) -> Document {
    elements
        .into_iter()
        .fold(Document::new(), Document::with_element)
}

/// Records every event dispatched on a bus, rendered with `Display`.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    /// Observe everything on `bus`.
    pub fn attach(bus: &EventBus) -> Self {
        let log = Self::default();
        let sink = log.events.clone();
        bus.observe(move |e| sink.lock().unwrap().push(e.to_string()));
        log
    }

    /// Events seen since the last call.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

/// Session with an event log attached.
pub fn logged_session() -> (Session, EventLog) {
    let session = Session::new();
    let log = EventLog::attach(session.bus());
    (session, log)
}

/// Poll bounds small enough to keep loop tests fast.
pub fn fast_config() -> ClientConfig {
    ClientConfig {
        poll: PollConfig {
            min_ms: 1,
            max_ms: 5,
            increment_ms: 1,
        },
        reset_on_session_lost: true,
    }
}

/// Client registered over a fresh scripted transport.
pub async fn scripted_client(config: ClientConfig) -> (Client, Arc<ScriptedTransport>, EventLog) {
    let transport = Arc::new(ScriptedTransport::new());
    let bus = Arc::new(EventBus::new());
    let log = EventLog::attach(&bus);
    let client = Client::connect_with_bus(transport.clone(), config, bus)
        .await
        .expect("Failed to connect scripted client");
    (client, transport, log)
}

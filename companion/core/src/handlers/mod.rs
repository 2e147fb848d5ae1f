//! Event Handlers
//!
//! A handler owns one event category (`time`, `idle`, `festival`, ...) and
//! maps each specific event of that category to response text. The
//! [`InteractionSystem`](crate::coordinator::InteractionSystem) routes every
//! `"<category>.*"` event to the handler registered for that category.

mod builtin;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rand::seq::SliceRandom;
use tracing::warn;

use crate::context::ContextManager;
use crate::dispatcher::{ActionDispatcher, OutputAction};

pub use builtin::{FestivalHandler, IdleHandler, TimeHandler};

/// Produces response text for one event
pub type ResponseFn = Arc<dyn Fn() -> String + Send + Sync>;

/// Specific event name → response producer
#[derive(Clone, Default)]
pub struct ResponseTable {
    entries: HashMap<String, ResponseFn>,
}

impl ResponseTable {
    /// Empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer `event` with `text`
    #[must_use]
    pub fn fixed(self, event: &str, text: &str) -> Self {
        let text = text.to_string();
        self.with(event, move || text.clone())
    }

    /// Answer `event` with one of `candidates`, chosen uniformly at random
    #[must_use]
    pub fn one_of(self, event: &str, candidates: &[&str]) -> Self {
        let candidates: Vec<String> = candidates.iter().map(ToString::to_string).collect();
        self.with(event, move || {
            candidates
                .choose(&mut rand::thread_rng())
                .cloned()
                .unwrap_or_default()
        })
    }

    /// Answer `event` with an arbitrary producer
    #[must_use]
    pub fn with<F>(mut self, event: &str, producer: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.entries.insert(event.to_string(), Arc::new(producer));
        self
    }

    /// Response for `event`, if the table knows it
    #[must_use]
    pub fn respond(&self, event: &str) -> Option<String> {
        self.entries.get(event).map(|producer| producer())
    }

    /// Whether `event` has a response
    #[must_use]
    pub fn contains(&self, event: &str) -> bool {
        self.entries.contains_key(event)
    }

    /// Number of events covered
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ResponseTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut events: Vec<&String> = self.entries.keys().collect();
        events.sort();
        f.debug_struct("ResponseTable").field("events", &events).finish()
    }
}

/// Responds to the events of one category
pub trait EventHandler: Send + Sync {
    /// Category this handler answers, e.g. `"time"`
    fn event_type(&self) -> &str;

    /// Response table keyed by full event name
    fn responses(&self) -> &ResponseTable;

    /// React to `event`
    ///
    /// The default looks the event up in [`responses`](Self::responses) and
    /// dispatches the text. Unknown events are logged and dropped.
    fn handle(&self, event: &str, _context: &ContextManager, dispatcher: &ActionDispatcher) {
        respond_with_table(self.responses(), event, dispatcher);
    }
}

/// Dispatch the table's response to `event`, if there is one
pub(crate) fn respond_with_table(table: &ResponseTable, event: &str, dispatcher: &ActionDispatcher) {
    match table.respond(event) {
        Some(text) => {
            dispatcher.send(OutputAction::new(text).with_event_type(event));
        }
        None => warn!(event, "no response registered for event"),
    }
}

//! Action Dispatcher
//!
//! The single exit point for everything the event system wants the companion
//! to say. Each [`OutputAction`] is stamped with metadata, handed to the
//! speech sink (normally the [`ChatPipeline`](crate::chat::ChatPipeline)) and
//! then offered to every registered listener.
//!
//! Listener failures are contained: an `Err` or a panic from one listener is
//! logged and the remaining listeners still run. Nothing propagates back into
//! the handler that produced the action.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::context::now_ms;

/// Value of [`ActionMetadata::source`] for actions produced by the event system
pub const EVENT_SYSTEM_SOURCE: &str = "event-system";

// ============================================================================
// Actions
// ============================================================================

/// Metadata attached when an action is dispatched
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionMetadata {
    /// Dispatch time (ms since epoch)
    pub timestamp: u64,
    /// Event that produced the action, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    /// Producer tag
    pub source: String,
}

/// Something the companion should say (and optionally do)
///
/// Immutable once dispatched; listeners receive it by reference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputAction {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<String>,
    metadata: ActionMetadata,
}

impl OutputAction {
    /// Action carrying `text`, unstamped
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: None,
            metadata: ActionMetadata {
                timestamp: 0,
                event_type: None,
                source: EVENT_SYSTEM_SOURCE.to_string(),
            },
        }
    }

    /// Attach an animation/gesture tag
    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Record the event that produced this action
    #[must_use]
    pub fn with_event_type(mut self, event: impl Into<String>) -> Self {
        self.metadata.event_type = Some(event.into());
        self
    }

    /// Text to speak and display
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Optional animation/gesture tag
    #[must_use]
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    /// Dispatch metadata
    #[must_use]
    pub fn metadata(&self) -> &ActionMetadata {
        &self.metadata
    }

    fn stamped(mut self) -> Self {
        self.metadata.timestamp = now_ms();
        self.metadata.source = EVENT_SYSTEM_SOURCE.to_string();
        self
    }
}

// ============================================================================
// Seams
// ============================================================================

/// Receiver of action text for speech synthesis
#[async_trait]
pub trait SpeechSink: Send + Sync {
    /// Speak `text`; completion and failure are the sink's business
    async fn speak(&self, text: &str);
}

/// Observer of dispatched actions
pub type ActionListener = Arc<dyn Fn(&OutputAction) -> anyhow::Result<()> + Send + Sync>;

/// Identity of a listener registration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Routes output actions to the speech sink and to listeners
pub struct ActionDispatcher {
    sink: Option<Arc<dyn SpeechSink>>,
    listeners: RwLock<Vec<(ListenerId, ActionListener)>>,
}

impl ActionDispatcher {
    /// Dispatcher forwarding action text to `sink`
    pub fn new(sink: Arc<dyn SpeechSink>) -> Self {
        Self {
            sink: Some(sink),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Dispatcher with listeners only
    #[must_use]
    pub fn without_speech() -> Self {
        Self {
            sink: None,
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Stamp `action`, hand its text to the speech sink, then notify listeners
    ///
    /// Returns the stamped action.
    pub fn send(&self, action: OutputAction) -> OutputAction {
        let action = action.stamped();
        debug!(
            text = action.text(),
            event = action.metadata().event_type.as_deref().unwrap_or("-"),
            "dispatching action"
        );

        self.forward_to_sink(&action);
        self.notify_listeners(&action);
        action
    }

    fn forward_to_sink(&self, action: &OutputAction) {
        let Some(sink) = self.sink.as_ref() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let sink = Arc::clone(sink);
                let text = action.text().to_string();
                runtime.spawn(async move { sink.speak(&text).await });
            }
            Err(_) => warn!("no async runtime; action text not spoken"),
        }
    }

    fn notify_listeners(&self, action: &OutputAction) {
        let listeners: Vec<(ListenerId, ActionListener)> = self
            .listeners
            .read()
            .iter()
            .map(|(id, l)| (*id, Arc::clone(l)))
            .collect();

        for (id, listener) in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(action))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(%id, error = %e, "action listener failed"),
                Err(_) => error!(%id, "action listener panicked"),
            }
        }
    }

    /// Register a listener
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&OutputAction) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = ListenerId::next();
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener; returns whether it was registered
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        before != listeners.len()
    }

    /// Number of registered listeners
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl fmt::Debug for ActionDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDispatcher")
            .field("speech", &self.sink.is_some())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingSink {
        spoken: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SpeechSink for RecordingSink {
        async fn speak(&self, text: &str) {
            self.spoken.lock().push(text.to_string());
        }
    }

    #[test]
    fn test_metadata_is_stamped() {
        let dispatcher = ActionDispatcher::without_speech();
        let sent = dispatcher.send(OutputAction::new("hi").with_event_type("time.morning"));

        assert_eq!(sent.text(), "hi");
        assert_eq!(sent.metadata().source, EVENT_SYSTEM_SOURCE);
        assert_eq!(sent.metadata().event_type.as_deref(), Some("time.morning"));
        assert!(sent.metadata().timestamp > 0);
    }

    #[test]
    fn test_failing_listeners_do_not_stop_others() {
        let dispatcher = ActionDispatcher::without_speech();
        let seen = Arc::new(Mutex::new(Vec::new()));

        dispatcher.add_listener(|_| anyhow::bail!("boom"));
        dispatcher.add_listener(|_| panic!("listener panic"));
        let sink = Arc::clone(&seen);
        dispatcher.add_listener(move |action| {
            sink.lock().push(action.text().to_string());
            Ok(())
        });

        dispatcher.send(OutputAction::new("still delivered"));
        assert_eq!(*seen.lock(), vec!["still delivered"]);
    }

    #[test]
    fn test_remove_listener() {
        let dispatcher = ActionDispatcher::without_speech();
        let id = dispatcher.add_listener(|_| Ok(()));
        dispatcher.add_listener(|_| Ok(()));
        assert_eq!(dispatcher.listener_count(), 2);

        assert!(dispatcher.remove_listener(id));
        assert!(!dispatcher.remove_listener(id));
        assert_eq!(dispatcher.listener_count(), 1);
    }

    #[tokio::test]
    async fn test_text_reaches_speech_sink() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = ActionDispatcher::new(sink.clone());

        dispatcher.send(OutputAction::new("good morning").with_action("wave"));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(*sink.spoken.lock(), vec!["good morning"]);
    }

    #[test]
    fn test_serialized_shape() {
        let dispatcher = ActionDispatcher::without_speech();
        let sent = dispatcher.send(OutputAction::new("hello").with_event_type("idle.random"));
        let json = serde_json::to_value(&sent).expect("serialize");

        assert_eq!(json["text"], "hello");
        assert_eq!(json["metadata"]["eventType"], "idle.random");
        assert_eq!(json["metadata"]["source"], "event-system");
        assert!(json.get("action").is_none());
    }
}

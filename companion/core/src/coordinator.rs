//! Interaction System
//!
//! The coordinator that wires sources, the bus, handlers and the dispatcher
//! together. Its lifecycle is driven by the host:
//!
//! ```text
//! register handlers / add sources ──▶ start() ──▶ ... ──▶ stop()
//! ```
//!
//! Registering a handler subscribes `"<category>.*"` on the bus once per
//! category. When an event arrives the handler currently registered for its
//! category answers it, so re-registering a category replaces the previous
//! handler instead of producing duplicate responses.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::InteractionConfig;
use crate::context::{ContextManager, ContextUpdate};
use crate::dispatcher::{ActionDispatcher, ListenerId};
use crate::events::{EventBus, EventName, Pattern, SubscriptionId};
use crate::handlers::{EventHandler, FestivalHandler, IdleHandler, TimeHandler};
use crate::sources::{Clock, EventSource, FestivalSource, IdleSource, TimeOfDaySource};

/// Handler registry keyed by category
type HandlerMap = DashMap<String, Arc<dyn EventHandler>>;

/// Point-in-time view of the system, for status displays
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SystemStatus {
    /// Whether `start` has been called without a matching `stop`
    pub running: bool,
    /// Registered handler categories, sorted
    pub handlers: Vec<String>,
    /// Source names with their running flag, in registration order
    pub sources: Vec<(String, bool)>,
    /// Live bus registrations
    pub subscriptions: usize,
    /// Registered dispatcher listeners
    pub listeners: usize,
}

/// Owns the event bus, the handler registry and every event source
pub struct InteractionSystem {
    config: InteractionConfig,
    bus: Arc<EventBus>,
    context: Arc<ContextManager>,
    dispatcher: Arc<ActionDispatcher>,
    handlers: Arc<HandlerMap>,
    sources: Vec<Box<dyn EventSource>>,
    running: bool,
    debug_tap: Option<SubscriptionId>,
    context_listener: ListenerId,
}

impl InteractionSystem {
    /// Empty system: no handlers, no sources
    pub fn new(config: InteractionConfig, dispatcher: Arc<ActionDispatcher>) -> Self {
        let context = Arc::new(ContextManager::new());

        // Keep the context's last message in step with what was said
        let ctx = Arc::clone(&context);
        let context_listener = dispatcher.add_listener(move |action| {
            ctx.update(ContextUpdate::new().last_message(action.text()));
            Ok(())
        });

        Self {
            config,
            bus: Arc::new(EventBus::new()),
            context,
            dispatcher,
            handlers: Arc::new(DashMap::new()),
            sources: Vec::new(),
            running: false,
            debug_tap: None,
            context_listener,
        }
    }

    /// System with the built-in time, idle and festival modules registered
    pub fn with_default_modules(
        config: InteractionConfig,
        dispatcher: Arc<ActionDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut system = Self::new(config, dispatcher);

        system.register_handler(Arc::new(TimeHandler::default()));
        system.register_handler(Arc::new(IdleHandler::new(system.config.idle_time)));
        system.register_handler(Arc::new(FestivalHandler::default()));

        let bus = system.bus();
        system.add_source(Box::new(TimeOfDaySource::new(
            Arc::clone(&bus),
            Arc::clone(&clock),
            system.config.time.clone(),
        )));
        system.add_source(Box::new(IdleSource::new(
            Arc::clone(&bus),
            system.config.idle.clone(),
        )));
        system.add_source(Box::new(FestivalSource::new(bus, clock)));

        system
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register `handler` for its category
    ///
    /// A later registration for the same category replaces the earlier one.
    pub fn register_handler(&self, handler: Arc<dyn EventHandler>) {
        let category = handler.event_type().to_string();

        if self.handlers.insert(category.clone(), handler).is_some() {
            warn!(%category, "replacing existing handler for category");
            return;
        }

        let handlers = Arc::clone(&self.handlers);
        let context = Arc::clone(&self.context);
        let dispatcher = Arc::clone(&self.dispatcher);
        let routed = category.clone();

        self.bus.on(Pattern::category(category.clone()), move |event| {
            let handler = handlers.get(&routed).map(|h| Arc::clone(h.value()));
            match handler {
                Some(handler) => handler.handle(event, &context, &dispatcher),
                None => debug!(event, "handler unregistered; event dropped"),
            }
        });

        info!(%category, "handler registered");
    }

    /// Add an event source; it is started with the system
    pub fn add_source(&mut self, mut source: Box<dyn EventSource>) {
        if self.running {
            source.start();
        }
        debug!(source = source.name(), "source added");
        self.sources.push(source);
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start every source; a second call while running only warns
    pub fn start(&mut self) {
        if self.running {
            warn!("interaction system already running");
            return;
        }

        if self.config.debug_events && self.debug_tap.is_none() {
            self.debug_tap = Some(self.bus.on("*", |event| debug!(event, "bus event")));
        }

        for source in &mut self.sources {
            source.start();
        }
        self.running = true;
        info!(sources = self.sources.len(), "interaction system started");
    }

    /// Stop every source; does nothing if not running
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }

        for source in &mut self.sources {
            source.stop();
        }
        if let Some(id) = self.debug_tap.take() {
            self.bus.off("*", id);
        }
        self.running = false;
        info!("interaction system stopped");
    }

    /// Whether the system is running
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Publish `event` as if a source had produced it
    ///
    /// Returns whether a handler is registered for the event's category.
    /// The event is published either way, so wildcard subscribers still see
    /// it.
    pub fn trigger_event(&self, event: &str) -> bool {
        let name = EventName::new(event);
        let handled = self.handlers.contains_key(name.category());
        if handled {
            info!(event, "manually triggered event");
        } else {
            warn!(event, category = name.category(), "no handler for event category");
        }
        self.bus.emit(name.as_str());
        handled
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The event bus
    #[must_use]
    pub fn bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.bus)
    }

    /// The shared context
    #[must_use]
    pub fn context(&self) -> Arc<ContextManager> {
        Arc::clone(&self.context)
    }

    /// The dispatcher
    #[must_use]
    pub fn dispatcher(&self) -> Arc<ActionDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Number of registered handler categories
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> SystemStatus {
        let mut handlers: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        handlers.sort();

        SystemStatus {
            running: self.running,
            handlers,
            sources: self
                .sources
                .iter()
                .map(|s| (s.name().to_string(), s.is_running()))
                .collect(),
            subscriptions: self.bus.subscription_count(),
            listeners: self.dispatcher.listener_count(),
        }
    }
}

impl Drop for InteractionSystem {
    fn drop(&mut self) {
        self.stop();
        self.dispatcher.remove_listener(self.context_listener);
    }
}

// ============================================================================
// Process-wide instance
// ============================================================================

static GLOBAL: OnceLock<Arc<Mutex<InteractionSystem>>> = OnceLock::new();

/// Install `system` as the process-wide instance
///
/// # Errors
///
/// Hands the system back, already wrapped, if one is installed.
pub fn install_global(
    system: InteractionSystem,
) -> Result<Arc<Mutex<InteractionSystem>>, Arc<Mutex<InteractionSystem>>> {
    let shared = Arc::new(Mutex::new(system));
    GLOBAL.set(Arc::clone(&shared))?;
    Ok(shared)
}

/// The process-wide instance, if installed
#[must_use]
pub fn global() -> Option<Arc<Mutex<InteractionSystem>>> {
    GLOBAL.get().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::ResponseTable;
    use parking_lot::Mutex as PlMutex;
    use pretty_assertions::assert_eq;

    struct Fixed {
        category: &'static str,
        table: ResponseTable,
    }

    impl Fixed {
        fn new(category: &'static str, event: &str, text: &str) -> Self {
            Self {
                category,
                table: ResponseTable::new().fixed(event, text),
            }
        }
    }

    impl EventHandler for Fixed {
        fn event_type(&self) -> &str {
            self.category
        }

        fn responses(&self) -> &ResponseTable {
            &self.table
        }
    }

    fn system_with_capture() -> (InteractionSystem, Arc<PlMutex<Vec<String>>>) {
        let dispatcher = Arc::new(ActionDispatcher::without_speech());
        let seen = Arc::new(PlMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        dispatcher.add_listener(move |a| {
            sink.lock().push(a.text().to_string());
            Ok(())
        });
        (
            InteractionSystem::new(InteractionConfig::default(), dispatcher),
            seen,
        )
    }

    #[test]
    fn test_events_route_to_category_handler() {
        let (system, seen) = system_with_capture();
        system.register_handler(Arc::new(Fixed::new("greet", "greet.hello", "hi!")));

        assert!(system.trigger_event("greet.hello"));
        assert!(!system.trigger_event("other.hello"));

        assert_eq!(*seen.lock(), vec!["hi!"]);
        assert_eq!(
            system.context().get().last_message.as_deref(),
            Some("hi!")
        );
    }

    #[test]
    fn test_reregistering_category_replaces_handler() {
        let (system, seen) = system_with_capture();
        system.register_handler(Arc::new(Fixed::new("greet", "greet.hello", "old")));
        system.register_handler(Arc::new(Fixed::new("greet", "greet.hello", "new")));

        system.trigger_event("greet.hello");

        assert_eq!(*seen.lock(), vec!["new"]);
        assert_eq!(system.handler_count(), 1);
        assert_eq!(system.bus().subscription_count(), 1);
    }

    #[test]
    fn test_stop_before_start_is_noop() {
        let (mut system, _) = system_with_capture();
        system.stop();
        assert!(!system.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_stop_lifecycle() {
        let dispatcher = Arc::new(ActionDispatcher::without_speech());
        let config = InteractionConfig {
            debug_events: true,
            ..InteractionConfig::default()
        };
        let mut system = InteractionSystem::with_default_modules(
            config,
            dispatcher,
            Arc::new(crate::sources::SystemClock),
        );

        system.start();
        system.start();
        let status = system.status();
        assert!(status.running);
        assert_eq!(status.handlers, vec!["festival", "idle", "time"]);
        assert!(status.sources.iter().all(|(_, running)| *running));
        // three category subscriptions plus the debug tap
        assert_eq!(status.subscriptions, 4);

        system.stop();
        system.stop();
        let status = system.status();
        assert!(!status.running);
        assert!(status.sources.iter().all(|(_, running)| !*running));
        assert_eq!(status.subscriptions, 3);
    }
}

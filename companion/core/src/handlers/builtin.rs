//! Built-in handlers for the time, idle and festival categories

use std::time::Duration;

use tracing::debug;

use super::{respond_with_table, EventHandler, ResponseTable};
use crate::context::ContextManager;
use crate::dispatcher::ActionDispatcher;

/// Greetings for `time.*`
#[derive(Debug)]
pub struct TimeHandler {
    table: ResponseTable,
}

impl Default for TimeHandler {
    fn default() -> Self {
        Self {
            table: ResponseTable::new()
                .fixed("time.morning", "Good morning! Let's make today a great one!")
                .fixed("time.noon", "Good afternoon! Don't forget to have some lunch.")
                .one_of(
                    "time.night",
                    &[
                        "Good night, sweet dreams!",
                        "It's getting really late... even I'm a little sleepy.",
                        "It's bedtime! Let's pick things up again tomorrow.",
                    ],
                ),
        }
    }
}

impl EventHandler for TimeHandler {
    fn event_type(&self) -> &str {
        "time"
    }

    fn responses(&self) -> &ResponseTable {
        &self.table
    }
}

/// Chatter for `idle.*`
///
/// Stays quiet while the companion is busy or the user interacted within
/// `min_gap`.
#[derive(Debug)]
pub struct IdleHandler {
    table: ResponseTable,
    min_gap: Duration,
}

impl IdleHandler {
    /// Handler that waits for `min_gap` of user inactivity before chatting
    #[must_use]
    pub fn new(min_gap: Duration) -> Self {
        Self {
            table: ResponseTable::new().one_of(
                "idle.random",
                &[
                    "What have you been up to lately?",
                    "Want to chat with me for a bit?",
                    "I'm not waiting for a head pat or anything. Not at all!",
                    "I'm happy as long as you're around.",
                    "I'll do my best to keep you company!",
                    "Hey! Hey!... Nothing, I just wanted to say your name.",
                ],
            ),
            min_gap,
        }
    }
}

impl Default for IdleHandler {
    fn default() -> Self {
        Self::new(Duration::from_secs(3 * 60))
    }
}

impl EventHandler for IdleHandler {
    fn event_type(&self) -> &str {
        "idle"
    }

    fn responses(&self) -> &ResponseTable {
        &self.table
    }

    fn handle(&self, event: &str, context: &ContextManager, dispatcher: &ActionDispatcher) {
        if !context.should_interact(self.min_gap) {
            debug!(event, idle_for = ?context.idle_for(), "user recently active; skipping idle chatter");
            return;
        }
        respond_with_table(&self.table, event, dispatcher);
    }
}

/// Greetings for `festival.*`
#[derive(Debug)]
pub struct FestivalHandler {
    table: ResponseTable,
}

impl Default for FestivalHandler {
    fn default() -> Self {
        Self {
            table: ResponseTable::new()
                .fixed(
                    "festival.newyear",
                    "Happy New Year! May this year bring you lots of luck!",
                )
                .fixed(
                    "festival.christmas",
                    "Merry Christmas! I hope today is full of joy and surprises!",
                ),
        }
    }
}

impl EventHandler for FestivalHandler {
    fn event_type(&self) -> &str {
        "festival"
    }

    fn responses(&self) -> &ResponseTable {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Context, ContextUpdate};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_dispatcher() -> (ActionDispatcher, Arc<AtomicUsize>) {
        let dispatcher = ActionDispatcher::without_speech();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        dispatcher.add_listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (dispatcher, count)
    }

    #[test]
    fn test_builtin_tables_cover_their_events() {
        let time = TimeHandler::default();
        for event in ["time.morning", "time.noon", "time.night"] {
            assert!(time.responses().contains(event), "{event}");
        }

        let festival = FestivalHandler::default();
        assert!(festival.responses().contains("festival.newyear"));
        assert!(festival.responses().contains("festival.christmas"));

        assert!(IdleHandler::default().responses().contains("idle.random"));
    }

    #[test]
    fn test_idle_handler_respects_recent_activity() {
        let handler = IdleHandler::new(Duration::from_secs(180));
        let (dispatcher, count) = counting_dispatcher();

        let context = ContextManager::new();
        handler.handle("idle.random", &context, &dispatcher);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        let long_ago = ContextManager::with_context(Context {
            last_interaction_ms: 0,
            ..Context::default()
        });
        handler.handle("idle.random", &long_ago, &dispatcher);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        long_ago.update(ContextUpdate::new().busy(true));
        handler.handle("idle.random", &long_ago, &dispatcher);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}

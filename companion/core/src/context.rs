//! Interaction Context
//!
//! A small bag of state shared by handlers: when the user last interacted,
//! the companion's current mood, whether it is busy, and the last thing it
//! said. Handlers read it to decide whether to speak at all.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Mood the context starts in
pub const DEFAULT_MOOD: &str = "neutral";

/// Milliseconds since the Unix epoch
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Snapshot of the interaction context
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Last user interaction (ms since epoch)
    pub last_interaction_ms: u64,
    /// Free-form mood label
    pub user_mood: String,
    /// Whether the companion is in the middle of something
    pub is_busy: bool,
    /// Last text the companion produced
    pub last_message: Option<String>,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            last_interaction_ms: now_ms(),
            user_mood: DEFAULT_MOOD.to_string(),
            is_busy: false,
            last_message: None,
        }
    }
}

/// Partial update merged into the context; `None` fields are left alone
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContextUpdate {
    /// New last-interaction timestamp
    pub last_interaction_ms: Option<u64>,
    /// New mood
    pub user_mood: Option<String>,
    /// New busy flag
    pub is_busy: Option<bool>,
    /// New last message
    pub last_message: Option<String>,
}

impl ContextUpdate {
    /// Empty update
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the user as having interacted now
    #[must_use]
    pub fn interacted_now(mut self) -> Self {
        self.last_interaction_ms = Some(now_ms());
        self
    }

    /// Set the mood
    #[must_use]
    pub fn mood(mut self, mood: impl Into<String>) -> Self {
        self.user_mood = Some(mood.into());
        self
    }

    /// Set the busy flag
    #[must_use]
    pub fn busy(mut self, busy: bool) -> Self {
        self.is_busy = Some(busy);
        self
    }

    /// Set the last message
    #[must_use]
    pub fn last_message(mut self, message: impl Into<String>) -> Self {
        self.last_message = Some(message.into());
        self
    }
}

/// Shared, thread-safe context store
#[derive(Debug, Default)]
pub struct ContextManager {
    state: RwLock<Context>,
}

impl ContextManager {
    /// Context initialised with "now" as the last interaction
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Context starting from an explicit snapshot
    #[must_use]
    pub fn with_context(context: Context) -> Self {
        Self {
            state: RwLock::new(context),
        }
    }

    /// Copy of the current context
    #[must_use]
    pub fn get(&self) -> Context {
        self.state.read().clone()
    }

    /// Merge `update` into the context
    pub fn update(&self, update: ContextUpdate) {
        let mut state = self.state.write();
        if let Some(ts) = update.last_interaction_ms {
            state.last_interaction_ms = ts;
        }
        if let Some(mood) = update.user_mood {
            state.user_mood = mood;
        }
        if let Some(busy) = update.is_busy {
            state.is_busy = busy;
        }
        if let Some(message) = update.last_message {
            state.last_message = Some(message);
        }
    }

    /// Record a user interaction happening now
    pub fn touch(&self) {
        self.update(ContextUpdate::new().interacted_now());
    }

    /// Time since the last user interaction
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        let last = self.state.read().last_interaction_ms;
        Duration::from_millis(now_ms().saturating_sub(last))
    }

    /// Whether unprompted chatter is appropriate
    ///
    /// True when the companion is not busy and at least `min_gap` has passed
    /// since the last user interaction.
    #[must_use]
    pub fn should_interact(&self, min_gap: Duration) -> bool {
        !self.state.read().is_busy && self.idle_for() >= min_gap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let ctx = ContextManager::new().get();
        assert_eq!(ctx.user_mood, "neutral");
        assert!(!ctx.is_busy);
        assert!(ctx.last_message.is_none());
    }

    #[test]
    fn test_update_merges_only_present_fields() {
        let manager = ContextManager::new();
        manager.update(ContextUpdate::new().mood("happy").last_message("hi"));
        manager.update(ContextUpdate::new().busy(true));

        let ctx = manager.get();
        assert_eq!(ctx.user_mood, "happy");
        assert_eq!(ctx.last_message.as_deref(), Some("hi"));
        assert!(ctx.is_busy);
    }

    #[test]
    fn test_should_interact_respects_gap_and_busy() {
        let manager = ContextManager::with_context(Context {
            last_interaction_ms: now_ms().saturating_sub(10 * 60 * 1000),
            ..Context::default()
        });
        assert!(manager.should_interact(Duration::from_secs(180)));

        manager.update(ContextUpdate::new().busy(true));
        assert!(!manager.should_interact(Duration::from_secs(180)));

        manager.update(ContextUpdate::new().busy(false));
        manager.touch();
        assert!(!manager.should_interact(Duration::from_secs(180)));
        assert!(manager.should_interact(Duration::ZERO));
    }
}

//! Speech-bubble display seam

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

/// Priority of streamed reply text
pub const STREAMING_PRIORITY: u32 = 999;

/// Priority of failure notices
pub const NOTICE_PRIORITY: u32 = 1;

/// Where reply text is shown
///
/// Implementations are called while the pipeline holds internal state and
/// must not call back into the pipeline.
pub trait MessageDisplay: Send + Sync {
    /// Show `text`
    ///
    /// `timeout` of `None` keeps the message until replaced or hidden.
    /// `transition` is the time over which the text should be revealed.
    fn show_temp_message(
        &self,
        text: &str,
        timeout: Option<Duration>,
        priority: u32,
        transition: Duration,
    );

    /// Hide whatever is shown
    fn hide_message(&self);
}

impl<T: MessageDisplay + ?Sized> MessageDisplay for std::sync::Arc<T> {
    fn show_temp_message(
        &self,
        text: &str,
        timeout: Option<Duration>,
        priority: u32,
        transition: Duration,
    ) {
        (**self).show_temp_message(text, timeout, priority, transition);
    }

    fn hide_message(&self) {
        (**self).hide_message();
    }
}

/// Display that writes bubble changes to the log
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingDisplay;

impl MessageDisplay for TracingDisplay {
    fn show_temp_message(
        &self,
        text: &str,
        timeout: Option<Duration>,
        priority: u32,
        transition: Duration,
    ) {
        info!(text, ?timeout, priority, ?transition, "bubble");
    }

    fn hide_message(&self) {
        debug!("bubble hidden");
    }
}

#[derive(Debug, Clone, Copy)]
struct Held {
    priority: u32,
    until: Option<Instant>,
}

/// Wraps a display so higher-priority messages are not overwritten early
///
/// While a message is held, showing a message of strictly lower priority is
/// ignored. The hold ends when the message's timeout elapses or on hide.
///
/// Equal priority is not suppressed: it replaces the held message, which is
/// how a streaming reply keeps updating its own bubble.
#[derive(Debug)]
pub struct PriorityDisplay<D> {
    inner: D,
    held: Mutex<Option<Held>>,
}

impl<D: MessageDisplay> PriorityDisplay<D> {
    /// Wrap `inner`
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            held: Mutex::new(None),
        }
    }
}

impl<D: MessageDisplay> MessageDisplay for PriorityDisplay<D> {
    fn show_temp_message(
        &self,
        text: &str,
        timeout: Option<Duration>,
        priority: u32,
        transition: Duration,
    ) {
        {
            let mut held = self.held.lock();
            let now = Instant::now();
            if let Some(current) = *held {
                let expired = current.until.is_some_and(|until| now >= until);
                if !expired && current.priority > priority {
                    debug!(priority, held = current.priority, "lower priority message suppressed");
                    return;
                }
            }
            *held = Some(Held {
                priority,
                until: timeout.map(|t| now + t),
            });
        }
        self.inner
            .show_temp_message(text, timeout, priority, transition);
    }

    fn hide_message(&self) {
        *self.held.lock() = None;
        self.inner.hide_message();
    }
}

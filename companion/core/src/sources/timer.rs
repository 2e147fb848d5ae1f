//! Single pending timer owned by a source

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// At most one spawned schedule loop plus its cancellation token
#[derive(Debug, Default)]
pub(crate) struct TimerSlot {
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl TimerSlot {
    pub(crate) fn is_armed(&self) -> bool {
        self.cancel.is_some()
    }

    /// Spawn `schedule` unless a loop is already armed. Returns whether it spawned.
    pub(crate) fn arm<F, Fut>(&mut self, schedule: F) -> bool
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.is_armed() {
            return false;
        }
        let token = CancellationToken::new();
        self.task = Some(tokio::spawn(schedule(token.clone())));
        self.cancel = Some(token);
        true
    }

    /// Cancel the loop. Returns whether anything was armed.
    pub(crate) fn disarm(&mut self) -> bool {
        let was_armed = self.cancel.is_some();
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
        was_armed
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.disarm();
    }
}

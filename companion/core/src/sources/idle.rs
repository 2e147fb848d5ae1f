//! Idle chatter

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use super::timer::TimerSlot;
use super::EventSource;
use crate::events::EventBus;

/// Event emitted when the idle timer fires
pub const IDLE_EVENT: &str = "idle.random";

/// Shortest delay [`IdleSchedule::next_delay`] returns
pub const MIN_IDLE_DELAY: Duration = Duration::from_secs(1);

/// Longest delay [`IdleSchedule::next_delay`] returns
pub const MAX_IDLE_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Randomised delay between idle events
///
/// Each delay is `base_unit × f` with `f` drawn uniformly from
/// `[min_factor, max_factor)`. Defaults give 60 to 100 seconds.
#[derive(Clone, Debug, PartialEq)]
pub struct IdleSchedule {
    /// When false the source never arms
    pub enabled: bool,
    /// Unit multiplied by the random factor
    pub base_unit: Duration,
    /// Lower bound of the factor
    pub min_factor: f64,
    /// Upper bound of the factor
    pub max_factor: f64,
}

impl Default for IdleSchedule {
    fn default() -> Self {
        Self {
            enabled: true,
            base_unit: Duration::from_secs(20),
            min_factor: 3.0,
            max_factor: 5.0,
        }
    }
}

impl IdleSchedule {
    /// Draw the next delay, clamped to [`MIN_IDLE_DELAY`]..=[`MAX_IDLE_DELAY`]
    ///
    /// Factors that cannot form a range (non-finite, reversed) fall back to
    /// `min_factor`. Never panics.
    pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let (min, max) = (self.min_factor, self.max_factor);
        let factor = if min.is_finite() && max.is_finite() && max > min && (max - min).is_finite()
        {
            rng.gen_range(min..max)
        } else {
            min
        };

        let secs = self.base_unit.as_secs_f64() * factor;
        if secs.is_nan() || secs <= 0.0 {
            return MIN_IDLE_DELAY;
        }
        Duration::try_from_secs_f64(secs)
            .map_or(MAX_IDLE_DELAY, |delay| delay.clamp(MIN_IDLE_DELAY, MAX_IDLE_DELAY))
    }
}

/// Emits [`IDLE_EVENT`] after a random delay, then re-arms itself
pub struct IdleSource {
    bus: Arc<EventBus>,
    schedule: IdleSchedule,
    timer: TimerSlot,
}

impl IdleSource {
    /// Create a stopped source
    pub fn new(bus: Arc<EventBus>, schedule: IdleSchedule) -> Self {
        Self {
            bus,
            schedule,
            timer: TimerSlot::default(),
        }
    }
}

impl EventSource for IdleSource {
    fn name(&self) -> &'static str {
        "idle"
    }

    fn start(&mut self) {
        if !self.schedule.enabled {
            debug!("idle events disabled; not arming");
            return;
        }

        let bus = Arc::clone(&self.bus);
        let schedule = self.schedule.clone();

        let armed = self.timer.arm(move |cancel| async move {
            let mut rng = StdRng::from_entropy();
            loop {
                let delay = schedule.next_delay(&mut rng);
                debug!(?delay, "next idle event scheduled");

                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => bus.emit(IDLE_EVENT),
                }
            }
        });

        if armed {
            info!("idle source started");
        }
    }

    fn stop(&mut self) {
        if self.timer.disarm() {
            info!("idle source stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.timer.is_armed()
    }
}

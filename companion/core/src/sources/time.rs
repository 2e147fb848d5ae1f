//! Time-of-day greetings

use std::sync::Arc;
use std::time::Duration;

use chrono::Timelike;
use tracing::{debug, info};

use super::clock::Clock;
use super::timer::TimerSlot;
use super::EventSource;
use crate::events::EventBus;

/// Hours that trigger greetings, and how often to look at the clock
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeSchedule {
    /// Hour (0-23) that emits `time.morning`
    pub morning_hour: u32,
    /// Hour that emits `time.noon`
    pub noon_hour: u32,
    /// Hour that emits `time.night`
    pub night_hour: u32,
    /// Delay between clock checks
    pub poll_interval: Duration,
}

impl Default for TimeSchedule {
    fn default() -> Self {
        Self {
            morning_hour: 7,
            noon_hour: 12,
            night_hour: 23,
            poll_interval: Duration::from_secs(50 * 60),
        }
    }
}

impl TimeSchedule {
    /// Event due during `hour`, if any
    #[must_use]
    pub fn event_for_hour(&self, hour: u32) -> Option<&'static str> {
        if hour == self.morning_hour {
            Some("time.morning")
        } else if hour == self.noon_hour {
            Some("time.noon")
        } else if hour == self.night_hour {
            Some("time.night")
        } else {
            None
        }
    }
}

/// Emits `time.*` events when the local hour hits a configured threshold
///
/// The clock is checked immediately on start and then once per poll
/// interval. With the default 50 minute interval a threshold hour is usually
/// seen once, occasionally twice.
pub struct TimeOfDaySource {
    bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    schedule: TimeSchedule,
    timer: TimerSlot,
}

impl TimeOfDaySource {
    /// Create a stopped source
    pub fn new(bus: Arc<EventBus>, clock: Arc<dyn Clock>, schedule: TimeSchedule) -> Self {
        Self {
            bus,
            clock,
            schedule,
            timer: TimerSlot::default(),
        }
    }
}

impl EventSource for TimeOfDaySource {
    fn name(&self) -> &'static str {
        "time"
    }

    fn start(&mut self) {
        let bus = Arc::clone(&self.bus);
        let clock = Arc::clone(&self.clock);
        let schedule = self.schedule.clone();

        let armed = self.timer.arm(move |cancel| async move {
            loop {
                let hour = clock.now().hour();
                if let Some(event) = schedule.event_for_hour(hour) {
                    debug!(hour, event, "time threshold reached");
                    bus.emit(event);
                }

                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(schedule.poll_interval) => {}
                }
            }
        });

        if armed {
            info!(poll = ?self.schedule.poll_interval, "time source started");
        }
    }

    fn stop(&mut self) {
        if self.timer.disarm() {
            info!("time source stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.timer.is_armed()
    }
}

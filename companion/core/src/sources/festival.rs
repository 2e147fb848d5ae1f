//! Festival greetings

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use tracing::{debug, info};

use super::clock::Clock;
use super::timer::TimerSlot;
use super::EventSource;
use crate::events::EventBus;

/// How often the date is checked
pub const FESTIVAL_CHECK_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// A fixed-date festival
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Festival {
    /// Month, 1-12
    pub month: u32,
    /// Day of month
    pub day: u32,
    /// Event emitted on that date
    pub event: &'static str,
}

/// Known festivals
pub const FESTIVALS: &[Festival] = &[
    Festival {
        month: 1,
        day: 1,
        event: "festival.newyear",
    },
    Festival {
        month: 12,
        day: 25,
        event: "festival.christmas",
    },
];

/// Events for festivals falling on `date`
pub fn festivals_on(date: NaiveDate) -> impl Iterator<Item = &'static str> {
    FESTIVALS
        .iter()
        .filter(move |f| f.month == date.month() && f.day == date.day())
        .map(|f| f.event)
}

/// Checks the date on start and once a day after that
pub struct FestivalSource {
    bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    timer: TimerSlot,
}

impl FestivalSource {
    /// Create a stopped source
    pub fn new(bus: Arc<EventBus>, clock: Arc<dyn Clock>) -> Self {
        Self {
            bus,
            clock,
            timer: TimerSlot::default(),
        }
    }
}

impl EventSource for FestivalSource {
    fn name(&self) -> &'static str {
        "festival"
    }

    fn start(&mut self) {
        let bus = Arc::clone(&self.bus);
        let clock = Arc::clone(&self.clock);

        let armed = self.timer.arm(move |cancel| async move {
            loop {
                let today = clock.now().date();
                for event in festivals_on(today) {
                    debug!(%today, event, "festival today");
                    bus.emit(event);
                }

                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(FESTIVAL_CHECK_INTERVAL) => {}
                }
            }
        });

        if armed {
            info!("festival source started");
        }
    }

    fn stop(&mut self) {
        if self.timer.disarm() {
            info!("festival source stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.timer.is_armed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::FixedClock;
    use parking_lot::Mutex;

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, month, day).expect("valid date")
    }

    #[test]
    fn test_festival_table() {
        assert_eq!(festivals_on(date(1, 1)).collect::<Vec<_>>(), vec!["festival.newyear"]);
        assert_eq!(
            festivals_on(date(12, 25)).collect::<Vec<_>>(),
            vec!["festival.christmas"]
        );
        assert_eq!(festivals_on(date(7, 4)).count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_checks_immediately_then_daily() {
        let bus = Arc::new(EventBus::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.on("festival.*", move |e| sink.lock().push(e.to_string()));

        let noon = |d: NaiveDate| d.and_hms_opt(12, 0, 0).expect("valid time");
        let clock = Arc::new(FixedClock::new(noon(date(12, 24))));
        let mut source = FestivalSource::new(Arc::clone(&bus), clock.clone());
        source.start();

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(seen.lock().is_empty());

        clock.set(noon(date(12, 25)));
        tokio::time::sleep(FESTIVAL_CHECK_INTERVAL).await;
        assert_eq!(*seen.lock(), vec!["festival.christmas"]);

        source.stop();
        source.stop();
        assert!(!source.is_running());
    }
}

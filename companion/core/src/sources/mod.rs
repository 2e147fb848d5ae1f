//! Event Sources
//!
//! Sources produce interaction events on their own schedule and publish them
//! on the [`EventBus`](crate::events::EventBus). Each source owns at most one
//! pending timer: `start` arms it (a second `start` is a no-op), `stop`
//! cancels it, and stopping a source that was never started does nothing.
//!
//! Built-in sources:
//!
//! | Source              | Events                                          |
//! |---------------------|-------------------------------------------------|
//! | [`TimeOfDaySource`] | `time.morning`, `time.noon`, `time.night`       |
//! | [`IdleSource`]      | `idle.random`                                   |
//! | [`FestivalSource`]  | `festival.newyear`, `festival.christmas`        |
//!
//! Timers run on the tokio runtime, so `start` must be called from within one.

mod clock;
mod festival;
mod idle;
mod time;
mod timer;

pub use clock::{Clock, FixedClock, SystemClock};
pub use festival::{festivals_on, Festival, FestivalSource, FESTIVALS, FESTIVAL_CHECK_INTERVAL};
pub use idle::{IdleSchedule, IdleSource, IDLE_EVENT, MAX_IDLE_DELAY, MIN_IDLE_DELAY};
pub use time::{TimeOfDaySource, TimeSchedule};

/// A module that emits interaction events on a schedule
pub trait EventSource: Send {
    /// Short name used in logs and status reports
    fn name(&self) -> &'static str;

    /// Arm the source's timer; calling it again while running does nothing
    fn start(&mut self);

    /// Cancel any pending timer; safe to call when not running
    fn stop(&mut self);

    /// Whether a timer is currently armed
    fn is_running(&self) -> bool;
}

//! Event Bus
//!
//! Name-based publish/subscribe for interaction events. Event names are
//! dot-delimited (`category.specific`, e.g. `time.morning`); subscribers
//! register under an exact name, a `prefix.*` wildcard, or `*`.
//!
//! The bus carries no business logic. It evaluates every registration against
//! each emitted name and invokes the matching callbacks synchronously, in
//! registration order, before `emit` returns.
//!
//! # Usage
//!
//! ```rust
//! use companion_core::events::EventBus;
//!
//! let bus = EventBus::new();
//! let id = bus.on("time.*", |event| println!("got {event}"));
//! bus.emit("time.morning");
//! bus.off("time.*", id);
//! ```

mod bus;
mod name;

pub use bus::{EventBus, EventCallback, SubscriptionId};
pub use name::{EventName, Pattern};

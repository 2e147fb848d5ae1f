//! Companion Core - Headless Interaction Events and Streaming Chat
//!
//! This crate decides, independent of any UI framework, *when* the desktop
//! companion should act on its own (time-of-day greetings, idle chatter,
//! festival greetings) and *how* those triggers reach the chat/voice output.
//! It also owns the streaming chat pipeline that turns a `data: ` framed
//! response into displayed text and queued audio.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                        InteractionSystem                           │
//! │  ┌──────────────┐   emit    ┌──────────┐  "<category>.*"           │
//! │  │ EventSources │ ────────▶ │ EventBus │ ──────────┐               │
//! │  │ time / idle  │           └──────────┘           ▼               │
//! │  │ festival     │                         ┌──────────────────┐     │
//! │  └──────────────┘                         │ EventHandler     │     │
//! │                                           │ (by category)    │     │
//! │                                           └────────┬─────────┘     │
//! │                                                    │ OutputAction  │
//! │                                           ┌────────▼─────────┐     │
//! │                                           │ ActionDispatcher │──▶ listeners (host UI)
//! │                                           └────────┬─────────┘     │
//! └────────────────────────────────────────────────────┼───────────────┘
//!                                                      │ speak(text)
//!                                             ┌────────▼─────────┐
//!                                             │   ChatPipeline   │◀── chat(message)
//!                                             │ decode → queue → │
//!                                             │ playback/display │
//!                                             └──────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`EventBus`]: name-based publish/subscribe with `*` and `prefix.*` patterns
//! - [`InteractionSystem`]: owns the bus, handler registry and source lifecycle
//! - [`ActionDispatcher`]: stamps outgoing actions and fans them out
//! - [`ChatPipeline`]: one chat turn at a time, FIFO text/audio playback
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use companion_core::{
//!     config::load_config, ActionDispatcher, ChatPipeline, HttpTransport, InteractionSystem,
//!     PipelineOptions, SystemClock, TracingDisplay,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let transport = Arc::new(HttpTransport::new(config.server.clone())?);
//!     let pipeline = Arc::new(ChatPipeline::new(
//!         transport,
//!         Arc::new(TracingDisplay),
//!         None,
//!         PipelineOptions::from_config(&config),
//!     ));
//!     let dispatcher = Arc::new(ActionDispatcher::new(pipeline.clone()));
//!     let mut system = InteractionSystem::with_default_modules(
//!         config.interaction.clone(),
//!         dispatcher,
//!         Arc::new(SystemClock),
//!     );
//!     system.start();
//!     pipeline.chat("hello").await;
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`events`]: event names, wildcard patterns and the bus
//! - [`context`]: shared interaction context (mood, busy flag, last message)
//! - [`sources`]: self-rescheduling event sources and the clock seam
//! - [`handlers`]: category handlers and their response tables
//! - [`coordinator`]: the interaction system lifecycle
//! - [`dispatcher`]: output actions and listener fan-out
//! - [`chat`]: history, stream decoding, transport, audio and display seams
//! - [`config`]: TOML + environment configuration
//! - [`error`]: chat pipeline error taxonomy

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod chat;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod handlers;
pub mod sources;

// Re-exports for convenience
pub use chat::{
    AudioSink, ChatHistory, ChatHistoryEntry, ChatPipeline, ChatRole, ChatTransport,
    HttpTransport, LineDecoder, MessageDisplay, PacedAudioSink, PipelineOptions,
    PriorityDisplay, StreamRecord, TextAudioPair, TracingDisplay, TurnOutcome, TurnPhase,
};
pub use config::{
    default_config_path, load_config, load_config_from_path, CompanionConfig, CompanionToml,
    ConfigError, ConfigOverrides, ConfigSource, InteractionConfig, PlaybackConfig,
    ServerConfig,
};
pub use context::{Context, ContextManager, ContextUpdate};
pub use coordinator::{InteractionSystem, SystemStatus};
pub use dispatcher::{
    ActionDispatcher, ActionMetadata, ListenerId, OutputAction, SpeechSink,
    EVENT_SYSTEM_SOURCE,
};
pub use error::ChatError;
pub use events::{EventBus, EventName, Pattern, SubscriptionId};
pub use handlers::{
    EventHandler, FestivalHandler, IdleHandler, ResponseTable, TimeHandler,
};
pub use sources::{
    Clock, EventSource, FestivalSource, FixedClock, IdleSchedule, IdleSource, SystemClock,
    TimeOfDaySource, TimeSchedule,
};

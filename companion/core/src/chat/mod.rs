//! Streaming Chat
//!
//! Everything between "the user typed something" (or "the event system wants
//! to say something") and "text is on screen and audio is playing":
//!
//! - [`history`]: the ordered user/assistant transcript sent with each turn
//! - [`decoder`]: `data: `-framed JSON line decoding, tolerant of chunk splits
//! - [`transport`]: the HTTP seam that opens response byte streams
//! - [`audio`]: audio decoding, duration estimates and the playback seam
//! - [`display`]: the speech-bubble seam with priority handling
//! - [`pipeline`]: the turn state machine tying the above together

pub mod audio;
pub mod decoder;
pub mod display;
pub mod history;
pub mod pipeline;
pub mod transport;

pub use audio::{AudioSink, PacedAudioSink, TextAudioPair};
pub use decoder::{LineDecoder, StreamRecord};
pub use display::{MessageDisplay, PriorityDisplay, TracingDisplay};
pub use history::{ChatHistory, ChatHistoryEntry, ChatRole};
pub use pipeline::{ChatPipeline, PipelineOptions, TurnOutcome, TurnPhase};
pub use transport::{ByteStream, ChatTransport, HttpTransport};

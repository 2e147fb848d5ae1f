//! Chat Pipeline
//!
//! Runs one turn at a time against a [`ChatTransport`] and drives the
//! display and audio sinks from the decoded stream.
//!
//! # Turn lifecycle
//!
//! ```text
//! Idle ──chat()──▶ Sending ──headers──▶ Streaming ──end of stream──▶ Completed
//!                    │                     │
//!                    └──── interrupt ──────┴──▶ Aborted
//! ```
//!
//! Starting a turn always interrupts the previous one first: the in-flight
//! request is cancelled, queued audio is discarded, playback stops and the
//! bubble is hidden. A turn generation counter makes late chunks and
//! late playback steps from an older turn no-ops.
//!
//! # Playback
//!
//! Text is shown as soon as it arrives. Records carrying audio are also
//! queued as [`TextAudioPair`]s and played strictly in arrival order by a
//! single playback task; their text is revealed over the clip's estimated
//! duration. When the queue drains the bubble is hidden after the configured
//! delay unless new output arrives first.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::audio::{decode_audio, reveal_duration, AudioSink, PacedAudioSink, TextAudioPair};
use super::decoder::{LineDecoder, StreamRecord};
use super::display::{MessageDisplay, NOTICE_PRIORITY, STREAMING_PRIORITY};
use super::history::{ChatHistory, ChatHistoryEntry};
use super::transport::{ByteStream, ChatTransport};
use crate::config::CompanionConfig;
use crate::dispatcher::SpeechSink;
use crate::error::ChatError;

/// Notice shown when a chat turn fails
pub const SEND_FAILURE_NOTICE: &str = "Failed to send message, please try again later.";

/// How long the failure notice stays up
pub const SEND_FAILURE_NOTICE_DURATION: Duration = Duration::from_secs(3);

// ============================================================================
// Public types
// ============================================================================

/// Pipeline tuning
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineOptions {
    /// Time allowed for the response to start; `None` waits forever
    pub request_timeout: Option<Duration>,
    /// Delay before hiding the bubble once playback drains
    pub hide_delay: Duration,
    /// Initial volume, clamped to 0.0-1.0
    pub volume: f32,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(60)),
            hide_delay: Duration::from_secs(5),
            volume: 1.0,
        }
    }
}

impl PipelineOptions {
    /// Options from the loaded configuration
    #[must_use]
    pub fn from_config(config: &CompanionConfig) -> Self {
        Self {
            request_timeout: config.server.request_timeout,
            hide_delay: config.playback.hide_delay,
            volume: config.playback.volume,
        }
    }
}

/// Where the current (or last) turn is
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnPhase {
    /// No turn has run yet
    Idle,
    /// Request sent, waiting for the response to start
    Sending,
    /// Reading the response stream
    Streaming,
    /// Stream ended normally
    Completed,
    /// Interrupted or failed
    Aborted,
}

/// How a turn ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Blank input; nothing was sent
    Rejected,
    /// The stream ended normally
    Completed,
    /// A newer turn or an explicit interrupt cancelled this one
    Interrupted,
    /// Network, status or timeout failure
    Failed,
}

impl TurnOutcome {
    /// Whether the turn completed
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Completed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TurnKind {
    Chat,
    Speech,
}

// ============================================================================
// Shared state
// ============================================================================

struct PipelineState {
    generation: u64,
    phase: TurnPhase,
    kind: TurnKind,
    history: ChatHistory,
    decoder: LineDecoder,
    /// Text received this turn, in arrival order
    reply_text: String,
    /// Text currently in the bubble
    shown_text: String,
    assistant_recorded: bool,
    queue: VecDeque<TextAudioPair>,
    playing: bool,
    volume: f32,
    request_cancel: Option<CancellationToken>,
    playback_cancel: Option<CancellationToken>,
    hide_cancel: Option<CancellationToken>,
}

/// State and sinks shared with the playback and hide tasks
struct Shared {
    state: Mutex<PipelineState>,
    audio: Arc<dyn AudioSink>,
    display: Arc<dyn MessageDisplay>,
    hide_delay: Duration,
    playing_tx: watch::Sender<bool>,
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

impl Shared {
    fn interrupt(&self) {
        {
            let mut state = self.state.lock();
            state.generation += 1;

            if let Some(token) = state.request_cancel.take() {
                token.cancel();
            }
            if let Some(token) = state.playback_cancel.take() {
                token.cancel();
            }
            Self::cancel_hide(&mut state);

            state.queue.clear();
            state.decoder.reset();
            state.reply_text.clear();
            state.shown_text.clear();
            state.playing = false;
            self.playing_tx.send_replace(false);

            if matches!(state.phase, TurnPhase::Sending | TurnPhase::Streaming) {
                state.phase = TurnPhase::Aborted;
            }
        }
        self.display.hide_message();
    }

    fn set_phase(&self, generation: u64, phase: TurnPhase) {
        let mut state = self.state.lock();
        if state.generation == generation {
            state.phase = phase;
        }
    }

    /// Feed a chunk; false if the turn has been superseded
    fn ingest(self: &Arc<Self>, generation: u64, chunk: &[u8]) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            return false;
        }
        for record in state.decoder.push(chunk) {
            self.apply_record(&mut state, record);
        }
        true
    }

    fn finish(self: &Arc<Self>, generation: u64) -> TurnOutcome {
        let mut state = self.state.lock();
        if state.generation != generation {
            return TurnOutcome::Interrupted;
        }

        if let Some(record) = state.decoder.finish() {
            self.apply_record(&mut state, record);
        }
        Self::record_assistant(&mut state);

        state.phase = TurnPhase::Completed;
        state.request_cancel = None;
        if !state.playing && state.queue.is_empty() && !state.shown_text.is_empty() {
            self.schedule_hide(&mut state);
        }

        info!(generation, history = state.history.len(), "turn completed");
        TurnOutcome::Completed
    }

    fn apply_record(self: &Arc<Self>, state: &mut PipelineState, record: StreamRecord) {
        let StreamRecord { text, audio, done } = record;
        state.reply_text.push_str(&text);

        let clip = if audio.is_empty() {
            None
        } else {
            match decode_audio(&audio) {
                Ok(clip) if !clip.is_empty() => Some(clip),
                Ok(_) => None,
                Err(e) => {
                    warn!(error = %e, "dropping undecodable audio payload");
                    None
                }
            }
        };

        let transition = clip
            .as_ref()
            .map_or(Duration::ZERO, |clip| reveal_duration(clip.len(), &text));
        self.show_now(state, &text, transition);

        if let Some(clip) = clip {
            Self::cancel_hide(state);
            state.queue.push_back(TextAudioPair { text, audio: clip });
            self.kick_playback(state);
        }

        if done {
            Self::record_assistant(state);
        }
    }

    fn show_now(&self, state: &mut PipelineState, text: &str, transition: Duration) {
        if text.is_empty() {
            return;
        }
        Self::cancel_hide(state);
        state.shown_text.push_str(text);
        self.display.show_temp_message(
            state.shown_text.trim(),
            None,
            STREAMING_PRIORITY,
            transition,
        );
    }

    /// Append the assistant entry once per chat turn, if there is any text
    fn record_assistant(state: &mut PipelineState) {
        if state.kind != TurnKind::Chat || state.assistant_recorded {
            return;
        }
        let reply = state.reply_text.trim();
        if reply.is_empty() {
            return;
        }
        let reply = reply.to_string();
        state.history.push_assistant(reply);
        state.assistant_recorded = true;
    }

    fn kick_playback(self: &Arc<Self>, state: &mut PipelineState) {
        if state.playing || state.queue.is_empty() {
            return;
        }
        state.playing = true;
        self.playing_tx.send_replace(true);

        let cancel = CancellationToken::new();
        state.playback_cancel = Some(cancel.clone());

        let shared = Arc::clone(self);
        tokio::spawn(shared.play_queue(cancel));
    }

    async fn play_queue(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            let (clip, volume) = {
                let mut state = self.state.lock();
                if cancel.is_cancelled() {
                    return;
                }

                let Some(pair) = state.queue.pop_front() else {
                    state.playing = false;
                    state.playback_cancel = None;
                    self.playing_tx.send_replace(false);
                    self.schedule_hide(&mut state);
                    return;
                };

                debug!(text = %pair.text, bytes = pair.audio.len(), "playing clip");
                (pair.audio, state.volume)
            };

            let played = tokio::select! {
                () = cancel.cancelled() => return,
                result = self.audio.play(clip, volume) => result,
            };
            if let Err(e) = played {
                warn!(error = %e, "clip playback failed; continuing with next");
            }
        }
    }

    fn schedule_hide(self: &Arc<Self>, state: &mut PipelineState) {
        Self::cancel_hide(state);

        let cancel = CancellationToken::new();
        state.hide_cancel = Some(cancel.clone());

        let display = Arc::clone(&self.display);
        let delay = self.hide_delay;
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(delay) => display.hide_message(),
            }
        });
    }

    fn cancel_hide(state: &mut PipelineState) {
        if let Some(token) = state.hide_cancel.take() {
            token.cancel();
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Streaming chat pipeline
///
/// Every operation takes `&self`; wrap it in an `Arc` to share it with the
/// [`ActionDispatcher`](crate::dispatcher::ActionDispatcher) and the UI.
pub struct ChatPipeline {
    transport: Arc<dyn ChatTransport>,
    request_timeout: Option<Duration>,
    shared: Arc<Shared>,
}

impl ChatPipeline {
    /// Pipeline over `transport` and `display`
    ///
    /// Without an audio sink, clips are paced silently by their estimated
    /// duration.
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        display: Arc<dyn MessageDisplay>,
        audio: Option<Arc<dyn AudioSink>>,
        options: PipelineOptions,
    ) -> Self {
        let (playing_tx, _) = watch::channel(false);
        let state = PipelineState {
            generation: 0,
            phase: TurnPhase::Idle,
            kind: TurnKind::Chat,
            history: ChatHistory::new(),
            decoder: LineDecoder::new(),
            reply_text: String::new(),
            shown_text: String::new(),
            assistant_recorded: false,
            queue: VecDeque::new(),
            playing: false,
            volume: clamp_volume(options.volume),
            request_cancel: None,
            playback_cancel: None,
            hide_cancel: None,
        };

        Self {
            transport,
            request_timeout: options.request_timeout,
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                audio: audio.unwrap_or_else(|| Arc::new(PacedAudioSink)),
                display,
                hide_delay: options.hide_delay,
                playing_tx,
            }),
        }
    }

    /// Send `message` as a user turn and stream the reply
    ///
    /// Blank messages are rejected without touching any state.
    pub async fn chat(&self, message: &str) -> TurnOutcome {
        if message.trim().is_empty() {
            debug!("rejecting blank message");
            return TurnOutcome::Rejected;
        }
        self.run_turn(TurnKind::Chat, message).await
    }

    /// Voice `text` through the speech endpoint without touching history
    pub async fn speak_text(&self, text: &str) -> TurnOutcome {
        if text.trim().is_empty() {
            return TurnOutcome::Rejected;
        }
        self.run_turn(TurnKind::Speech, text).await
    }

    /// Stop everything: request, queued audio, playback and the bubble
    pub fn interrupt_current_playback(&self) {
        self.shared.interrupt();
        debug!("playback interrupted");
    }

    async fn run_turn(&self, kind: TurnKind, payload: &str) -> TurnOutcome {
        self.shared.interrupt();

        let (generation, cancel, user_index, history) = {
            let mut state = self.shared.state.lock();
            state.generation += 1;
            state.kind = kind;
            state.phase = TurnPhase::Sending;
            state.assistant_recorded = false;

            let cancel = CancellationToken::new();
            state.request_cancel = Some(cancel.clone());

            let user_index = match kind {
                TurnKind::Chat => Some(state.history.push_user(payload)),
                TurnKind::Speech => None,
            };
            (
                state.generation,
                cancel,
                user_index,
                state.history.entries().to_vec(),
            )
        };

        info!(?kind, generation, transport = self.transport.name(), "turn started");

        let opened = tokio::select! {
            () = cancel.cancelled() => Err(ChatError::Cancelled),
            result = self.open_stream(kind, payload, &history) => result,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => return self.fail_turn(generation, user_index, &e),
        };
        self.shared.set_phase(generation, TurnPhase::Streaming);

        loop {
            let next = tokio::select! {
                () = cancel.cancelled() => return TurnOutcome::Interrupted,
                next = stream.next() => next,
            };
            match next {
                Some(Ok(chunk)) => {
                    if !self.shared.ingest(generation, &chunk) {
                        return TurnOutcome::Interrupted;
                    }
                }
                Some(Err(e)) => return self.fail_turn(generation, user_index, &e),
                None => break,
            }
        }

        self.shared.finish(generation)
    }

    async fn open_stream(
        &self,
        kind: TurnKind,
        payload: &str,
        history: &[ChatHistoryEntry],
    ) -> Result<ByteStream, ChatError> {
        let open = async {
            match kind {
                TurnKind::Chat => self.transport.open_chat(history).await,
                TurnKind::Speech => self.transport.open_speech(payload).await,
            }
        };

        match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, open)
                .await
                .unwrap_or(Err(ChatError::Timeout(limit))),
            None => open.await,
        }
    }

    fn fail_turn(&self, generation: u64, user_index: Option<usize>, err: &ChatError) -> TurnOutcome {
        if err.is_cancellation() {
            return TurnOutcome::Interrupted;
        }

        let kind = {
            let mut state = self.shared.state.lock();
            if state.generation != generation {
                return TurnOutcome::Interrupted;
            }
            state.request_cancel = None;

            if state.assistant_recorded {
                // The reply was already complete; treat the trailing error as end of stream
                state.phase = TurnPhase::Completed;
                return TurnOutcome::Completed;
            }

            if let Some(index) = user_index {
                state.history.rollback_user(index);
            }
            state.phase = TurnPhase::Aborted;
            state.kind
        };

        warn!(error = %err, ?kind, "turn failed");

        if kind == TurnKind::Chat {
            self.shared.display.hide_message();
            self.shared.display.show_temp_message(
                SEND_FAILURE_NOTICE,
                Some(SEND_FAILURE_NOTICE_DURATION),
                NOTICE_PRIORITY,
                Duration::ZERO,
            );
        }
        TurnOutcome::Failed
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Set the playback volume, clamped to 0.0-1.0
    pub fn set_volume(&self, volume: f32) {
        self.shared.state.lock().volume = clamp_volume(volume);
    }

    /// Current playback volume
    #[must_use]
    pub fn volume(&self) -> f32 {
        self.shared.state.lock().volume
    }

    /// Whether a reply is being voiced
    #[must_use]
    pub fn is_replying(&self) -> bool {
        self.shared.state.lock().playing
    }

    /// Watch the playing flag
    #[must_use]
    pub fn playing(&self) -> watch::Receiver<bool> {
        self.shared.playing_tx.subscribe()
    }

    /// Phase of the current or last turn
    #[must_use]
    pub fn phase(&self) -> TurnPhase {
        self.shared.state.lock().phase
    }

    /// Copy of the transcript
    #[must_use]
    pub fn history(&self) -> Vec<ChatHistoryEntry> {
        self.shared.state.lock().history.entries().to_vec()
    }

    /// Forget the transcript
    pub fn clear_history(&self) {
        self.shared.state.lock().history.clear();
    }

    /// Clips waiting to be played
    #[must_use]
    pub fn queued_clips(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Bytes of a partial line held by the decoder
    #[must_use]
    pub fn pending_line_bytes(&self) -> usize {
        self.shared.state.lock().decoder.pending()
    }

    /// Text currently in the bubble
    #[must_use]
    pub fn displayed_text(&self) -> String {
        self.shared.state.lock().shown_text.clone()
    }
}

impl fmt::Debug for ChatPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("ChatPipeline")
            .field("transport", &self.transport.name())
            .field("phase", &state.phase)
            .field("history", &state.history.len())
            .field("queued", &state.queue.len())
            .field("playing", &state.playing)
            .finish()
    }
}

#[async_trait]
impl SpeechSink for ChatPipeline {
    async fn speak(&self, text: &str) {
        let outcome = self.speak_text(text).await;
        debug!(?outcome, "speech turn finished");
    }
}

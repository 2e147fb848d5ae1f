//! Test doubles shared by the integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;

use companion_core::chat::transport::ByteStream;
use companion_core::{AudioSink, ChatError, ChatHistoryEntry, ChatTransport, MessageDisplay};

// =============================================================================
// Display
// =============================================================================

/// One call made against the display
#[derive(Clone, Debug, PartialEq)]
pub enum Shown {
    Message {
        text: String,
        timeout: Option<Duration>,
        priority: u32,
    },
    Hidden,
}

#[derive(Default)]
pub struct RecordingDisplay {
    calls: Mutex<Vec<Shown>>,
}

impl RecordingDisplay {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Shown> {
        self.calls.lock().clone()
    }

    pub fn last_text(&self) -> Option<String> {
        self.calls.lock().iter().rev().find_map(|c| match c {
            Shown::Message { text, .. } => Some(text.clone()),
            Shown::Hidden => None,
        })
    }

    pub fn is_hidden(&self) -> bool {
        matches!(self.calls.lock().last(), Some(Shown::Hidden))
    }
}

impl MessageDisplay for RecordingDisplay {
    fn show_temp_message(
        &self,
        text: &str,
        timeout: Option<Duration>,
        priority: u32,
        _transition: Duration,
    ) {
        self.calls.lock().push(Shown::Message {
            text: text.to_string(),
            timeout,
            priority,
        });
    }

    fn hide_message(&self) {
        self.calls.lock().push(Shown::Hidden);
    }
}

// =============================================================================
// Audio
// =============================================================================

/// Records clips; each play takes `clip_time` and clips equal to `fail_on` error out
pub struct RecordingAudio {
    played: Mutex<Vec<(Bytes, f32)>>,
    clip_time: Duration,
    fail_on: Option<Bytes>,
}

impl RecordingAudio {
    pub fn new(clip_time: Duration) -> Arc<Self> {
        Arc::new(Self {
            played: Mutex::new(Vec::new()),
            clip_time,
            fail_on: None,
        })
    }

    pub fn failing_on(clip_time: Duration, clip: &'static [u8]) -> Arc<Self> {
        Arc::new(Self {
            played: Mutex::new(Vec::new()),
            clip_time,
            fail_on: Some(Bytes::from_static(clip)),
        })
    }

    pub fn played(&self) -> Vec<Bytes> {
        self.played.lock().iter().map(|(b, _)| b.clone()).collect()
    }

    pub fn volumes(&self) -> Vec<f32> {
        self.played.lock().iter().map(|(_, v)| *v).collect()
    }
}

#[async_trait]
impl AudioSink for RecordingAudio {
    async fn play(&self, audio: Bytes, volume: f32) -> anyhow::Result<()> {
        self.played.lock().push((audio.clone(), volume));
        tokio::time::sleep(self.clip_time).await;
        if self.fail_on.as_ref() == Some(&audio) {
            anyhow::bail!("device rejected clip");
        }
        Ok(())
    }
}

// =============================================================================
// Transport
// =============================================================================

/// What the scripted transport does when a stream is opened
#[derive(Clone)]
pub enum Script {
    /// Emit these chunks, waiting `gap` before each
    Chunks { chunks: Vec<String>, gap: Duration },
    /// Fail to open
    Fail,
    /// Never answer
    Hang,
    /// Emit the chunks, then a stream error
    Broken(Vec<String>),
}

impl Script {
    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Chunks {
            chunks: chunks.into_iter().map(Into::into).collect(),
            gap: Duration::ZERO,
        }
    }

    pub fn slow<I, S>(chunks: I, gap: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Chunks {
            chunks: chunks.into_iter().map(Into::into).collect(),
            gap,
        }
    }
}

/// Plays back queued scripts, one per opened stream, and records requests
pub struct ScriptedTransport {
    scripts: Mutex<Vec<Script>>,
    chat_requests: Mutex<Vec<Vec<ChatHistoryEntry>>>,
    speech_requests: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts),
            chat_requests: Mutex::new(Vec::new()),
            speech_requests: Mutex::new(Vec::new()),
        })
    }

    pub fn chat_requests(&self) -> Vec<Vec<ChatHistoryEntry>> {
        self.chat_requests.lock().clone()
    }

    pub fn speech_requests(&self) -> Vec<String> {
        self.speech_requests.lock().clone()
    }

    async fn open(&self) -> Result<ByteStream, ChatError> {
        let script = {
            let mut scripts = self.scripts.lock();
            if scripts.is_empty() {
                Script::chunks(Vec::<String>::new())
            } else {
                scripts.remove(0)
            }
        };

        match script {
            Script::Fail => Err(ChatError::Status {
                status: 503,
                body: "unavailable".into(),
            }),
            Script::Hang => {
                futures::future::pending::<()>().await;
                Err(ChatError::Cancelled)
            }
            Script::Chunks { chunks, gap } => Ok(stream::iter(chunks)
                .then(move |chunk| async move {
                    if !gap.is_zero() {
                        tokio::time::sleep(gap).await;
                    }
                    Ok::<Bytes, ChatError>(Bytes::from(chunk))
                })
                .boxed()),
            Script::Broken(chunks) => Ok(stream::iter(
                chunks
                    .into_iter()
                    .map(|c| Ok::<Bytes, ChatError>(Bytes::from(c)))
                    .chain(std::iter::once(Err(ChatError::Stream("reset".into())))),
            )
            .boxed()),
        }
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn open_chat(&self, history: &[ChatHistoryEntry]) -> Result<ByteStream, ChatError> {
        self.chat_requests.lock().push(history.to_vec());
        self.open().await
    }

    async fn open_speech(&self, text: &str) -> Result<ByteStream, ChatError> {
        self.speech_requests.lock().push(text.to_string());
        self.open().await
    }
}

// =============================================================================
// Wire helpers
// =============================================================================

pub fn b64(raw: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(raw)
}

/// One `data: ` line carrying text and audio
pub fn pair_line(text: &str, audio: &[u8]) -> String {
    format!(
        "data: {}\n",
        serde_json::json!({ "text": text, "audio": b64(audio), "done": false })
    )
}

/// One `data: ` line carrying only text
pub fn text_line(text: &str) -> String {
    format!("data: {}\n", serde_json::json!({ "text": text }))
}

pub fn done_line() -> String {
    "data: {\"done\":true}\n".to_string()
}

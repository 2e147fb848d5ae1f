//! Stream Record Decoding
//!
//! Chat and speech responses are newline-delimited. Each meaningful line is
//! `data: ` followed by one JSON object. Network chunks split lines at
//! arbitrary byte offsets, so the decoder keeps the trailing partial line
//! until the next chunk (or the end of the stream) completes it.
//!
//! Two record shapes are accepted:
//!
//! ```text
//! data: {"text": "Hel", "audio": "<base64>", "done": false}
//! data: {"type": "text" | "audio" | "complete", "data": "..."}
//! ```
//!
//! Lines without the prefix are skipped; malformed JSON is logged and
//! dropped. Neither aborts the stream.

use serde::Deserialize;
use tracing::{trace, warn};

/// Prefix every data line carries
pub const DATA_PREFIX: &str = "data: ";

/// One decoded record, normalised to the text/audio/done shape
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamRecord {
    /// Text fragment (possibly empty)
    pub text: String,
    /// Base64 audio for this fragment (possibly empty)
    pub audio: String,
    /// Whether the server marked the reply complete
    pub done: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum RecordKind {
    Text,
    Audio,
    Complete,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireRecord {
    Typed {
        #[serde(rename = "type")]
        kind: RecordKind,
        #[serde(default)]
        data: String,
    },
    Pair {
        #[serde(default)]
        text: String,
        #[serde(default)]
        audio: String,
        #[serde(default)]
        done: bool,
    },
}

impl From<WireRecord> for StreamRecord {
    fn from(wire: WireRecord) -> Self {
        match wire {
            WireRecord::Pair { text, audio, done } => Self { text, audio, done },
            WireRecord::Typed { kind, data } => match kind {
                RecordKind::Text => Self {
                    text: data,
                    ..Self::default()
                },
                RecordKind::Audio => Self {
                    audio: data,
                    ..Self::default()
                },
                RecordKind::Complete => Self {
                    done: true,
                    ..Self::default()
                },
            },
        }
    }
}

/// Result of decoding one complete line
#[derive(Debug)]
pub enum LineOutcome {
    /// A record
    Record(StreamRecord),
    /// Blank or not `data: `-prefixed
    Skipped,
    /// Prefixed but not a valid record
    Malformed(serde_json::Error),
}

/// Decode one complete line
#[must_use]
pub fn parse_line(line: &str) -> LineOutcome {
    let line = line.trim();
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return LineOutcome::Skipped;
    };

    match serde_json::from_str::<WireRecord>(payload) {
        Ok(wire) => LineOutcome::Record(wire.into()),
        Err(e) => LineOutcome::Malformed(e),
    }
}

/// Incremental line decoder
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    /// Decoder with an empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return the records completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamRecord> {
        self.buffer.extend_from_slice(chunk);

        let mut records = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(record) = decode(&line) {
                records.push(record);
            }
        }
        records
    }

    /// Decode whatever is left once the stream has ended
    pub fn finish(&mut self) -> Option<StreamRecord> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        decode(&rest)
    }

    /// Drop any buffered partial line
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Bytes of the partial line currently held
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn decode(line: &[u8]) -> Option<StreamRecord> {
    let line = String::from_utf8_lossy(line);
    match parse_line(&line) {
        LineOutcome::Record(record) => Some(record),
        LineOutcome::Skipped => {
            if !line.trim().is_empty() {
                trace!(line = %line.trim(), "skipping unframed line");
            }
            None
        }
        LineOutcome::Malformed(e) => {
            warn!(error = %e, line = %line.trim(), "dropping malformed stream record");
            None
        }
    }
}

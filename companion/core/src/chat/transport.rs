//! Chat Transport
//!
//! Opens response byte streams for chat turns and speech requests. The
//! pipeline only sees a stream of byte chunks; framing and decoding happen
//! in [`decoder`](super::decoder).
//!
//! Both endpoints take a POST with a JSON body of the form `{"msg": ...}`:
//! the full history for chat, the text to voice for speech.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use serde_json::json;
use tracing::debug;

use super::history::ChatHistoryEntry;
use crate::config::ServerConfig;
use crate::error::ChatError;

/// Response body as a stream of chunks
pub type ByteStream = BoxStream<'static, Result<Bytes, ChatError>>;

/// Opens chat and speech response streams
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Send the full history and stream the reply
    async fn open_chat(&self, history: &[ChatHistoryEntry]) -> Result<ByteStream, ChatError>;

    /// Ask for `text` to be voiced and stream the result
    async fn open_speech(&self, text: &str) -> Result<ByteStream, ChatError>;
}

/// reqwest-backed transport talking to the companion backend
#[derive(Debug, Clone)]
pub struct HttpTransport {
    server: ServerConfig,
    http_client: reqwest::Client,
}

impl HttpTransport {
    /// Transport for `server`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(server: ServerConfig) -> Result<Self, ChatError> {
        let http_client = reqwest::Client::builder().build()?;
        Ok(Self {
            server,
            http_client,
        })
    }

    /// Server this transport talks to
    #[must_use]
    pub fn server(&self) -> &ServerConfig {
        &self.server
    }

    async fn post(&self, url: String, body: serde_json::Value) -> Result<ByteStream, ChatError> {
        debug!(%url, "opening response stream");

        let response = self.http_client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Status { status, body });
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ChatError::from))
            .boxed())
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn open_chat(&self, history: &[ChatHistoryEntry]) -> Result<ByteStream, ChatError> {
        self.post(self.server.chat_url(), json!({ "msg": history }))
            .await
    }

    async fn open_speech(&self, text: &str) -> Result<ByteStream, ChatError> {
        self.post(self.server.speech_url(), json!({ "msg": text }))
            .await
    }
}

//! Agent-side response emission
//!
//! [`ResponseEmitter`] builds events stamped with the agent's identity, validates each
//! one with the same pipeline clients use, and hands it to an [`EventSink`]. Once the
//! done event has been emitted nothing else can be sent.

use crate::protocol::events::{
    DocumentEvent, DoneEvent, ErrorContent, ErrorEvent, ResponseEvent, TextBlockEvent,
    TextChunkEvent, DEFAULT_SCHEMA_VERSION, DONE_EVENT_NAME, ERROR_EVENT_NAME,
};
use crate::protocol::identifier::Identifier;
use crate::protocol::identity::Identity;
use crate::transport::channel::{byte_channel, ChannelByteSource};
use crate::transport::sse::Frame;
use crate::validation::{ValidationContext, ValidationFailure};
use bytes::Bytes;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

const OUTBOUND_CONTEXT: &str = "outbound";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EmitterError {
    #[error("Response already completed")]
    Completed,
    #[error("Text stream {stream_id} already completed")]
    StreamCompleted { stream_id: String },
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
    #[error("Event could not be encoded: {0}")]
    Encode(String),
    #[error("Event sink closed")]
    SinkClosed,
}

/// Destination of validated events
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    async fn send(&self, event: &ResponseEvent) -> Result<(), EmitterError>;
}

/// Writes each event as an encoded frame into a byte channel
#[derive(Debug, Clone)]
pub struct FrameSink {
    sender: mpsc::Sender<Bytes>,
}

impl FrameSink {
    pub fn new(sender: mpsc::Sender<Bytes>) -> Self {
        Self { sender }
    }

    /// Sink wired to a byte source a client stream can read
    pub fn channel(buffer: usize) -> (Self, ChannelByteSource) {
        let (sender, source) = byte_channel(buffer);
        (Self::new(sender), source)
    }

    /// Wire frame for `event` (pure function)
    pub fn encode(event: &ResponseEvent) -> Result<Frame, EmitterError> {
        let data = serde_json::to_string(event).map_err(|e| EmitterError::Encode(e.to_string()))?;
        Ok(Frame::new(event.content_type().as_str(), data))
    }
}

#[async_trait::async_trait]
impl EventSink for FrameSink {
    async fn send(&self, event: &ResponseEvent) -> Result<(), EmitterError> {
        let frame = Self::encode(event)?;
        self.sender
            .send(frame.to_bytes())
            .await
            .map_err(|_| EmitterError::SinkClosed)
    }
}

/// Emits the response sequence for one request
pub struct ResponseEmitter<K: EventSink> {
    identity: Identity,
    sink: K,
    context: Arc<ValidationContext>,
    completed: AtomicBool,
}

impl<K: EventSink> ResponseEmitter<K> {
    pub fn new(identity: Identity, sink: K, context: Arc<ValidationContext>) -> Self {
        Self {
            identity,
            sink,
            context,
            completed: AtomicBool::new(false),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// Emit a structured JSON document
    pub async fn emit_json(
        &self,
        event_name: &str,
        content: Map<String, Value>,
    ) -> Result<(), EmitterError> {
        self.emit(ResponseEvent::Document(DocumentEvent {
            id: Identifier::generate(),
            event_name: event_name.to_string(),
            schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
            source: self.identity.source(),
            metadata: None,
            content,
        }))
        .await
    }

    /// Emit a complete block of text
    pub async fn emit_text_block(&self, event_name: &str, content: &str) -> Result<(), EmitterError> {
        self.emit(ResponseEvent::TextBlock(TextBlockEvent {
            id: Identifier::generate(),
            event_name: event_name.to_string(),
            schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
            source: self.identity.source(),
            metadata: None,
            content: content.to_string(),
        }))
        .await
    }

    /// Start a text stream; its chunks share one generated stream id
    pub fn create_text_stream(&self, event_name: &str) -> TextStream<'_, K> {
        TextStream {
            emitter: self,
            event_name: event_name.to_string(),
            stream_id: Identifier::generate().to_string(),
            completed: false,
        }
    }

    pub async fn emit_error(&self, content: ErrorContent) -> Result<(), EmitterError> {
        self.emit(ResponseEvent::Error(ErrorEvent {
            id: Identifier::generate(),
            event_name: ERROR_EVENT_NAME.to_string(),
            schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
            source: self.identity.source(),
            metadata: None,
            content,
        }))
        .await
    }

    /// Emit the done event; every later emit fails with [`EmitterError::Completed`]
    pub async fn complete(&self) -> Result<(), EmitterError> {
        self.emit(ResponseEvent::Done(DoneEvent {
            id: Some(Identifier::generate()),
            event_name: DONE_EVENT_NAME.to_string(),
            schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
            source: Some(self.identity.source()),
            metadata: None,
        }))
        .await?;
        self.completed.store(true, Ordering::SeqCst);
        debug!(source = %self.identity.source(), "Response completed");
        Ok(())
    }

    async fn emit(&self, event: ResponseEvent) -> Result<(), EmitterError> {
        if self.is_completed() {
            return Err(EmitterError::Completed);
        }

        let raw = serde_json::to_value(&event).map_err(|e| EmitterError::Encode(e.to_string()))?;
        let event = self
            .context
            .validate_response_event(&raw, Some(OUTBOUND_CONTEXT))?;
        self.sink.send(&event).await
    }
}

/// Incrementally delivered text sharing one stream id
pub struct TextStream<'a, K: EventSink> {
    emitter: &'a ResponseEmitter<K>,
    event_name: String,
    stream_id: String,
    completed: bool,
}

impl<K: EventSink> TextStream<'_, K> {
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub async fn emit_chunk(&mut self, chunk: &str) -> Result<(), EmitterError> {
        self.send(chunk, false).await
    }

    /// Emit the empty terminal chunk
    pub async fn complete(&mut self) -> Result<(), EmitterError> {
        self.send("", true).await?;
        self.completed = true;
        Ok(())
    }

    async fn send(&self, content: &str, is_complete: bool) -> Result<(), EmitterError> {
        if self.completed {
            return Err(EmitterError::StreamCompleted {
                stream_id: self.stream_id.clone(),
            });
        }

        self.emitter
            .emit(ResponseEvent::TextChunk(TextChunkEvent {
                id: Identifier::generate(),
                event_name: self.event_name.clone(),
                schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
                source: self.emitter.identity.source(),
                metadata: None,
                stream_id: self.stream_id.clone(),
                is_complete,
                content: content.to_string(),
            }))
            .await
    }
}

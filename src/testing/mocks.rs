//! Mock implementations for testing
//!
//! Scripted transports and sinks so the client and emitter can be exercised without a
//! network.

use crate::agent::emitter::{EmitterError, EventSink};
use crate::protocol::events::ResponseEvent;
use crate::protocol::request::RequestBody;
use crate::transport::sse::Frame;
use crate::transport::{ByteSource, Transport, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Byte source replaying a fixed sequence of chunks
#[derive(Debug, Default, Clone)]
pub struct ScriptedByteSource {
    chunks: VecDeque<Bytes>,
    failure: Option<TransportError>,
    reads: usize,
}

impl ScriptedByteSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_chunks<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        Self {
            chunks: chunks
                .into_iter()
                .map(|c| Bytes::copy_from_slice(c.as_ref()))
                .collect(),
            ..Self::default()
        }
    }

    /// One chunk per encoded frame
    pub fn from_frames(frames: &[Frame]) -> Self {
        Self::from_chunks(frames.iter().map(Frame::encode))
    }

    pub fn push_chunk(mut self, chunk: impl AsRef<[u8]>) -> Self {
        self.chunks.push_back(Bytes::copy_from_slice(chunk.as_ref()));
        self
    }

    /// Fail with `error` once every scripted chunk has been read
    pub fn then_fail(mut self, error: TransportError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Number of `next_chunk` calls so far
    pub fn reads(&self) -> usize {
        self.reads
    }
}

#[async_trait]
impl ByteSource for ScriptedByteSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, TransportError> {
        self.reads += 1;
        if let Some(chunk) = self.chunks.pop_front() {
            return Ok(Some(chunk));
        }
        match self.failure.take() {
            Some(error) => Err(error),
            None => Ok(None),
        }
    }
}

/// Mock transport for testing
///
/// Records every request body and answers each one with the next scripted source.
#[derive(Debug, Default, Clone)]
pub struct MockTransport {
    pub requests: Arc<Mutex<Vec<RequestBody>>>,
    pub responses: Arc<Mutex<VecDeque<ScriptedByteSource>>>,
    pub should_fail: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport whose first request is answered by `source`
    pub fn replying(source: ScriptedByteSource) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from([source]))),
            ..Default::default()
        }
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    pub async fn push_response(&self, source: ScriptedByteSource) {
        self.responses.lock().await.push_back(source);
    }

    pub async fn get_requests(&self) -> Vec<RequestBody> {
        self.requests.lock().await.clone()
    }

    pub async fn clear_history(&self) {
        self.requests.lock().await.clear();
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Source = ScriptedByteSource;

    async fn open(&self, body: &RequestBody) -> Result<ScriptedByteSource, TransportError> {
        if self.should_fail {
            return Err(TransportError::Status {
                status: 500,
                body: "Mock transport failure".to_string(),
            });
        }

        self.requests.lock().await.push(body.clone());
        self.responses
            .lock()
            .await
            .pop_front()
            .ok_or(TransportError::MissingBody)
    }
}

/// Event sink that records everything it receives
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    pub events: Arc<Mutex<Vec<ResponseEvent>>>,
    pub should_fail: bool,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    pub async fn get_events(&self) -> Vec<ResponseEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl EventSink for CollectingSink {
    async fn send(&self, event: &ResponseEvent) -> Result<(), EmitterError> {
        if self.should_fail {
            return Err(EmitterError::SinkClosed);
        }
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

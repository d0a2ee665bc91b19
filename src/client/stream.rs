//! Response stream orchestration
//!
//! Pulls byte chunks from a [`ByteSource`], decodes frames, validates each frame into a
//! [`ResponseEvent`], records it in the session ledger and yields it. One chunk read is
//! in flight at a time and events leave in exactly the order their frames arrived.
//!
//! The stream fails closed: a transport or validation failure is reported once, pending
//! frames are discarded and the source is released. Any later read reports
//! [`StreamError::Closed`].

use crate::ledger::{LedgerError, SessionLedger};
use crate::protocol::identifier::Identifier;
use crate::protocol::events::ResponseEvent;
use crate::transport::sse::{Frame, FrameDecoder, FrameError, FramingPolicy};
use crate::transport::{ByteSource, TransportError};
use crate::validation::contract::ROOT_PATH;
use crate::validation::{ValidationContext, ValidationFailure, RESPONSE_EVENT_LABEL};
use futures::Stream;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;
use tracing::field::{display, Empty};
use tracing::{debug, error, warn, Instrument, Span};

/// Lifecycle of a response stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Nothing read yet
    Idle,
    AwaitingChunk,
    /// Decoded frames are waiting to be validated
    FramesPending,
    /// Done event seen or the transport closed
    Done,
    Failed,
}

impl StreamState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamState::Done | StreamState::Failed)
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StreamError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("Response stream is closed")]
    Closed,
}

/// Lazy, ordered sequence of validated response events
pub struct ResponseStream<S: ByteSource> {
    source: Option<S>,
    decoder: FrameDecoder,
    pending: VecDeque<Frame>,
    state: StreamState,
    context: Arc<ValidationContext>,
    ledger: Option<SessionLedger>,
    frames_received: u64,
    events_yielded: u64,
    saw_done: bool,
    span: Span,
}

impl<S: ByteSource> ResponseStream<S> {
    pub fn new(source: S, context: Arc<ValidationContext>) -> Self {
        Self {
            source: Some(source),
            decoder: FrameDecoder::new(),
            pending: VecDeque::new(),
            state: StreamState::Idle,
            context,
            ledger: None,
            frames_received: 0,
            events_yielded: 0,
            saw_done: false,
            span: crate::stream_span!(request_id = Empty),
        }
    }

    /// Record every yielded event on the ledger's current interaction
    pub fn with_ledger(mut self, ledger: SessionLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Tag the stream's span with the request it answers
    pub fn for_request(self, request_id: &Identifier) -> Self {
        self.span.record("request_id", display(request_id));
        self
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn with_policy(mut self, policy: FramingPolicy) -> Self {
        self.decoder = FrameDecoder::with_policy(policy);
        self
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn events_yielded(&self) -> u64 {
        self.events_yielded
    }

    /// Whether the agent terminated the sequence with a done event
    pub fn saw_done(&self) -> bool {
        self.saw_done
    }

    pub fn frames_skipped(&self) -> u64 {
        self.decoder.frames_skipped()
    }

    /// Next validated event
    ///
    /// `Ok(None)` is returned once when the transport closes without a done event.
    pub async fn next_event(&mut self) -> Result<Option<ResponseEvent>, StreamError> {
        let span = self.span.clone();
        self.read_event().instrument(span).await
    }

    async fn read_event(&mut self) -> Result<Option<ResponseEvent>, StreamError> {
        loop {
            if self.state.is_terminal() {
                return Err(StreamError::Closed);
            }

            if let Some(frame) = self.pending.pop_front() {
                self.state = StreamState::FramesPending;
                return match self.accept(frame) {
                    Ok(event) => {
                        self.events_yielded += 1;
                        if event.is_done() {
                            self.finish_done();
                        } else if self.pending.is_empty() {
                            self.state = StreamState::AwaitingChunk;
                        }
                        Ok(Some(event))
                    }
                    Err(e) => Err(self.fail(e)),
                };
            }

            self.state = StreamState::AwaitingChunk;
            let Some(source) = self.source.as_mut() else {
                return Err(StreamError::Closed);
            };

            match source.next_chunk().await {
                Ok(Some(chunk)) => match self.decoder.push(&chunk) {
                    Ok(frames) => {
                        self.frames_received += frames.len() as u64;
                        self.pending.extend(frames);
                    }
                    Err(e) => return Err(self.fail(e.into())),
                },
                Ok(None) => {
                    self.decoder.finish();
                    self.source = None;
                    self.state = StreamState::Done;
                    warn!(
                        events = self.events_yielded,
                        "Transport closed before a done event"
                    );
                    return Ok(None);
                }
                Err(e) => return Err(self.fail(e.into())),
            }
        }
    }

    /// Drain the stream, stopping after the done event or transport closure
    pub async fn collect_events(mut self) -> Result<Vec<ResponseEvent>, StreamError> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await? {
            let done = event.is_done();
            events.push(event);
            if done {
                break;
            }
        }
        Ok(events)
    }

    /// Adapt to a [`futures::Stream`] that ends after the done event
    pub fn into_stream(self) -> impl Stream<Item = Result<ResponseEvent, StreamError>> + Send
    where
        S: 'static,
    {
        futures::stream::unfold(Some(self), |stream| async move {
            let mut stream = stream?;
            match stream.next_event().await {
                Ok(Some(event)) => Some((Ok(event), Some(stream))),
                Ok(None) | Err(StreamError::Closed) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    fn accept(&mut self, frame: Frame) -> Result<ResponseEvent, StreamError> {
        let context = format!("frame {} ({})", self.frames_received_index(), frame.event_type);
        let payload = with_frame_content_type(&frame, &context)?;
        let event = self
            .context
            .validate_response_event(&payload, Some(&context))?;

        if let Some(ledger) = &self.ledger {
            ledger.append_response(event.clone())?;
        }

        debug!(
            content_type = %event.content_type(),
            event_name = event.event_name(),
            "Event validated"
        );
        Ok(event)
    }

    // 1-based position of the frame being accepted
    fn frames_received_index(&self) -> u64 {
        self.frames_received - self.pending.len() as u64
    }

    fn finish_done(&mut self) {
        if !self.pending.is_empty() {
            debug!(
                discarded = self.pending.len(),
                "Discarding frames after done event"
            );
        }
        self.saw_done = true;
        self.pending.clear();
        self.decoder.finish();
        self.source = None;
        self.state = StreamState::Done;
    }

    fn fail(&mut self, error: StreamError) -> StreamError {
        error!(
            error = %error,
            discarded = self.pending.len(),
            "Response stream failed"
        );
        self.pending.clear();
        self.decoder.finish();
        self.source = None;
        self.state = StreamState::Failed;
        error
    }
}

/// Parse the frame payload and reconcile its `content_type` with the frame's event type
fn with_frame_content_type(frame: &Frame, context: &str) -> Result<Value, ValidationFailure> {
    let mut payload: Value = serde_json::from_str(&frame.data).map_err(|e| {
        ValidationFailure::single(
            RESPONSE_EVENT_LABEL,
            ROOT_PATH,
            format!("Invalid JSON: {e}"),
            Some(context),
        )
    })?;

    if let Value::Object(object) = &mut payload {
        match object.get("content_type") {
            None => {
                object.insert(
                    "content_type".to_string(),
                    Value::String(frame.event_type.clone()),
                );
            }
            Some(Value::String(declared)) if *declared != frame.event_type => {
                return Err(ValidationFailure::single(
                    RESPONSE_EVENT_LABEL,
                    "content_type",
                    format!(
                        "Frame event type '{}' does not match payload content_type '{declared}'",
                        frame.event_type
                    ),
                    Some(context),
                ));
            }
            Some(_) => {}
        }
    }

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedByteSource;

    fn stream(chunks: &[&str]) -> ResponseStream<ScriptedByteSource> {
        ResponseStream::new(
            ScriptedByteSource::from_chunks(chunks.iter().copied()),
            Arc::new(ValidationContext::new()),
        )
    }

    #[tokio::test]
    async fn test_done_then_closed() {
        let mut stream = stream(&["event: atomic.done\ndata: {}", "\n\n"]);
        assert_eq!(stream.state(), StreamState::Idle);

        let event = stream.next_event().await.unwrap().unwrap();
        assert!(event.is_done());
        assert!(stream.saw_done());
        assert_eq!(stream.state(), StreamState::Done);
        assert_eq!(stream.next_event().await, Err(StreamError::Closed));
    }

    #[tokio::test]
    async fn test_eof_without_done_reports_none_once() {
        let mut stream = stream(&[]);
        assert_eq!(stream.next_event().await, Ok(None));
        assert!(!stream.saw_done());
        assert_eq!(stream.next_event().await, Err(StreamError::Closed));
    }

    #[tokio::test]
    async fn test_content_type_mismatch_fails_closed() {
        let mut stream = stream(&[
            "event: atomic.json\ndata: {\"content_type\":\"atomic.done\"}\n\nevent: atomic.done\ndata: {}\n\n",
        ]);
        match stream.next_event().await {
            Err(StreamError::Validation(failure)) => {
                assert!(failure.messages_for("content_type").is_some());
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert_eq!(stream.state(), StreamState::Failed);
        assert_eq!(stream.next_event().await, Err(StreamError::Closed));
    }

    #[tokio::test]
    async fn test_transport_error_is_terminal() {
        let source = ScriptedByteSource::from_chunks(["event: atomic.do"])
            .then_fail(TransportError::Aborted("connection reset".to_string()));
        let mut stream = ResponseStream::new(source, Arc::new(ValidationContext::new()));

        assert!(matches!(
            stream.next_event().await,
            Err(StreamError::Transport(TransportError::Aborted(_)))
        ));
        assert_eq!(stream.next_event().await, Err(StreamError::Closed));
    }

    #[tokio::test]
    async fn test_strict_policy_surfaces_malformed_frames() {
        let mut stream = stream(&["event: atomic.done\n\n"]).with_policy(FramingPolicy::Strict);
        assert!(matches!(
            stream.next_event().await,
            Err(StreamError::Frame(FrameError::Malformed { .. }))
        ));
    }

    #[test]
    fn test_reads_run_inside_the_stream_span() {
        tracing::subscriber::with_default(tracing_subscriber::registry(), || {
            let stream = stream(&[]).for_request(&Identifier::generate());
            let metadata = stream.span().metadata().unwrap();
            assert_eq!(metadata.name(), "response_stream");
            assert!(metadata.fields().field("request_id").is_some());
        });
    }

    #[test]
    fn test_frame_type_fills_missing_content_type() {
        let payload = with_frame_content_type(&Frame::new("atomic.done", "{}"), "frame 1").unwrap();
        assert_eq!(payload["content_type"], "atomic.done");

        let failure =
            with_frame_content_type(&Frame::new("atomic.done", "{oops"), "frame 1").unwrap_err();
        assert!(failure.messages_for(ROOT_PATH).is_some());
    }
}

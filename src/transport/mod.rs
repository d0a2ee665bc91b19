//! Transport layer for agent communication
//!
//! The core only needs two things from a transport: a way to submit a request body,
//! and a source that yields the response one byte chunk at a time. [`Transport`] and
//! [`ByteSource`] are those seams; [`http`] is the reqwest implementation and
//! [`sse`] turns the chunks into frames.

use crate::protocol::RequestBody;
use bytes::Bytes;
use thiserror::Error;

pub mod channel;
pub mod http;
pub mod sse;

pub use channel::{byte_channel, ChannelByteSource};
pub use http::{HttpByteSource, HttpTransport, HttpTransportConfig};
pub use sse::{Frame, FrameDecoder, FrameError, FramingPolicy};

/// Transport-level failures; every variant ends the stream it occurs on
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("Agent responded with HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Agent response has no body")]
    MissingBody,
    #[error("Response stream aborted: {0}")]
    Aborted(String),
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Request body could not be encoded: {0}")]
    Encode(String),
    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(String),
}

impl TransportError {
    /// Whether the agent answered at all
    pub fn is_status(&self) -> bool {
        matches!(self, TransportError::Status { .. })
    }
}

/// Pull-based source of response bytes
///
/// Exactly one `next_chunk` call is in flight at a time. `Ok(None)` is end of stream.
#[async_trait::async_trait]
pub trait ByteSource: Send {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, TransportError>;
}

/// Submits one request and hands back its response body
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    type Source: ByteSource + 'static;

    async fn open(&self, body: &RequestBody) -> Result<Self::Source, TransportError>;
}

#[async_trait::async_trait]
impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, TransportError> {
        (**self).next_chunk().await
    }
}

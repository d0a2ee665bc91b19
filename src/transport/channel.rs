//! In-process byte channel
//!
//! Connects an agent-side frame writer directly to a client-side [`ResponseStream`]
//! without a network hop.
//!
//! [`ResponseStream`]: crate::client::stream::ResponseStream

use crate::transport::{ByteSource, TransportError};
use bytes::Bytes;
use tokio::sync::mpsc;

/// Receiving half of an in-process byte channel
#[derive(Debug)]
pub struct ChannelByteSource {
    receiver: mpsc::Receiver<Bytes>,
}

impl ChannelByteSource {
    pub fn new(receiver: mpsc::Receiver<Bytes>) -> Self {
        Self { receiver }
    }
}

/// Bounded channel; the stream ends once every sender is dropped
pub fn byte_channel(buffer: usize) -> (mpsc::Sender<Bytes>, ChannelByteSource) {
    let (sender, receiver) = mpsc::channel(buffer);
    (sender, ChannelByteSource::new(receiver))
}

#[async_trait::async_trait]
impl ByteSource for ChannelByteSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, TransportError> {
        Ok(self.receiver.recv().await)
    }
}

//! Server-sent event framing
//!
//! Frames are an `event:` line and a `data:` line terminated by a blank line. The
//! decoder keeps one byte buffer across reads, so a delimiter or a multi-byte character
//! split between two chunks is reassembled before the frame is parsed.

use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

/// Blank line terminating every frame
pub const FRAME_DELIMITER: &[u8] = b"\n\n";

const EVENT_PREFIX: &str = "event:";
const DATA_PREFIX: &str = "data:";

/// One decoded `(event type, payload)` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub event_type: String,
    pub data: String,
}

impl Frame {
    pub fn new(event_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: data.into(),
        }
    }

    /// Wire form including the terminating blank line
    pub fn encode(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.event_type, self.data)
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(self.encode())
    }
}

/// What to do with a frame missing its `event:` or `data:` line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramingPolicy {
    /// Drop the frame and keep decoding
    #[default]
    Lenient,
    /// Report the frame as an error
    Strict,
}

impl FramingPolicy {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            FramingPolicy::Strict
        } else {
            FramingPolicy::Lenient
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("Malformed frame: {reason}")]
    Malformed { reason: String, frame: String },
}

/// Incremental frame decoder
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    policy: FramingPolicy,
    decoded: u64,
    skipped: u64,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: FramingPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> FramingPolicy {
        self.policy
    }

    /// Append `chunk` and return every frame it completed, in order
    ///
    /// The buffer never holds a complete delimiter between calls, so the search resumes
    /// just before the appended bytes and consumed frames are drained once at the end.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Frame>, FrameError> {
        let mut search_from = self
            .buffer
            .len()
            .saturating_sub(FRAME_DELIMITER.len() - 1);
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = find_delimiter(&self.buffer[search_from..]) {
            let end = search_from + offset;
            let text = String::from_utf8_lossy(&self.buffer[consumed..end]).into_owned();
            consumed = end + FRAME_DELIMITER.len();
            search_from = consumed;

            match parse_frame(&text) {
                FrameOutcome::Frame(frame) => {
                    self.decoded += 1;
                    frames.push(frame);
                }
                FrameOutcome::Heartbeat => {}
                FrameOutcome::Malformed(reason) => {
                    self.skipped += 1;
                    if self.policy == FramingPolicy::Strict {
                        self.buffer.drain(..consumed);
                        return Err(FrameError::Malformed {
                            reason: reason.to_string(),
                            frame: text,
                        });
                    }
                    debug!(reason, frame = %text, "Skipping malformed frame");
                }
            }
        }

        self.buffer.drain(..consumed);
        Ok(frames)
    }

    /// End of input: drop any partial frame and return how many bytes were discarded
    pub fn finish(&mut self) -> usize {
        let discarded = self.buffer.len();
        if discarded > 0 {
            debug!(bytes = discarded, "Discarding unterminated frame at end of stream");
        }
        self.buffer.clear();
        discarded
    }

    /// Bytes waiting for a delimiter
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn frames_decoded(&self) -> u64 {
        self.decoded
    }

    pub fn frames_skipped(&self) -> u64 {
        self.skipped
    }
}

/// Decode a complete byte sequence in one pass
pub fn decode_all(bytes: &[u8], policy: FramingPolicy) -> Result<Vec<Frame>, FrameError> {
    let mut decoder = FrameDecoder::with_policy(policy);
    let frames = decoder.push(bytes)?;
    decoder.finish();
    Ok(frames)
}

fn find_delimiter(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(FRAME_DELIMITER.len())
        .position(|window| window == FRAME_DELIMITER)
}

#[derive(Debug, PartialEq)]
enum FrameOutcome {
    Frame(Frame),
    Heartbeat,
    Malformed(&'static str),
}

// Blank and comment-only frames are keep-alives, never errors
fn parse_frame(text: &str) -> FrameOutcome {
    let lines: Vec<&str> = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();

    if lines
        .iter()
        .all(|line| line.trim().is_empty() || line.starts_with(':'))
    {
        return FrameOutcome::Heartbeat;
    }

    let event_type = field_value(&lines, EVENT_PREFIX);
    let data = field_value(&lines, DATA_PREFIX);

    match (event_type, data) {
        (None, _) => FrameOutcome::Malformed("missing event line"),
        (_, None) => FrameOutcome::Malformed("missing data line"),
        (Some(""), _) => FrameOutcome::Malformed("empty event type"),
        (_, Some("")) => FrameOutcome::Malformed("empty data"),
        (Some(event_type), Some(data)) => FrameOutcome::Frame(Frame::new(event_type, data)),
    }
}

fn field_value<'a>(lines: &[&'a str], prefix: &str) -> Option<&'a str> {
    lines
        .iter()
        .find_map(|line| line.strip_prefix(prefix))
        .map(str::trim)
}

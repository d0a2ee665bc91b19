//! Sentient agent client - Rust Implementation
//!
//! Typed, validated event streams between a client and a remote agent over HTTP.
//!
//! # Overview
//!
//! - Protocol types for queries, sessions and the closed set of response events
//! - Server-sent event framing that is independent of chunk boundaries
//! - JSON Schema validation with per-field diagnostics
//! - An append-only session ledger correlating requests with their responses
//! - A response stream that yields validated events in arrival order
//! - The agent-side emitter producing that stream
//!
//! # Quick Start
//!
//! ```rust
//! use sentient_agent_client::client::ResponseStream;
//! use sentient_agent_client::protocol::ResponseEvent;
//! use sentient_agent_client::testing::ScriptedByteSource;
//! use sentient_agent_client::validation::ValidationContext;
//! use std::sync::Arc;
//!
//! let source = ScriptedByteSource::from_chunks([
//!     "event: atomic.textblock\ndata: {\"id\":\"01ARZ3NDEKTSV4RRFFQ69G5FAV\",",
//!     "\"event_name\":\"answer\",\"source\":\"agent\",\"content\":\"hi\"}\n\n",
//!     "event: atomic.done\ndata: {}\n\n",
//! ]);
//! let stream = ResponseStream::new(source, Arc::new(ValidationContext::new()));
//!
//! let events = futures::executor::block_on(stream.collect_events()).unwrap();
//! assert!(matches!(&events[0], ResponseEvent::TextBlock(block) if block.content == "hi"));
//! assert!(events[1].is_done());
//! ```

pub mod agent;
pub mod client;
pub mod config;
pub mod error;
pub mod ledger;
pub mod observability;
pub mod protocol;
pub mod testing;
pub mod transport;
pub mod validation;

pub use client::{AgentClient, ResponseStream, StreamError, StreamState};
pub use config::{ClientConfig, ConfigError};
pub use error::{ClientError, ClientResult};
pub use ledger::{LedgerError, SessionLedger};
pub use protocol::*;
pub use validation::{ValidationContext, ValidationFailure, ValidationResult};

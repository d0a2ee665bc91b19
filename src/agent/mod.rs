//! Agent side of the protocol
//!
//! Produces the event stream a client consumes: every event is validated before it is
//! written, and the sequence always ends with exactly one done event.

pub mod emitter;

pub use emitter::*;

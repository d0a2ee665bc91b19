//! Testing utilities and mock implementations
//!
//! Lets the response stream, client and emitter be driven without an agent endpoint.

pub mod mocks;

pub use mocks::*;

//! Observability: structured logging and validation counters

pub mod logging;
pub mod metrics;

pub use logging::{init_default_logging, init_logging, LogFormat};
pub use metrics::{SchemaTimingSnapshot, ValidationMetrics};

// Span macros for structured logging
pub use logging::{request_span, stream_span, validation_span};

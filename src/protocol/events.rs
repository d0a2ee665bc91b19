//! Response event model
//!
//! The closed set of events an agent streams back for one request. Every event carries
//! a `content_type` discriminator; [`ResponseEvent`] is the exhaustive union consumers
//! match on.

use crate::protocol::identifier::Identifier;
use crate::validation::contract::{Contract, Scope};
use schemars::gen::SchemaGenerator;
use schemars::schema::{
    InstanceType, ObjectValidation, Schema, SchemaObject, SubschemaValidation,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Schema version stamped on events that do not declare one
pub const DEFAULT_SCHEMA_VERSION: &str = "1.0";

/// Fixed event name of [`ErrorEvent`]
pub const ERROR_EVENT_NAME: &str = "error";

/// Fixed event name of [`DoneEvent`]
pub const DONE_EVENT_NAME: &str = "done";

/// Default [`ErrorContent::error_code`]
pub const DEFAULT_ERROR_CODE: i32 = 500;

fn default_schema_version() -> String {
    DEFAULT_SCHEMA_VERSION.to_string()
}

fn default_error_event_name() -> String {
    ERROR_EVENT_NAME.to_string()
}

fn default_done_event_name() -> String {
    DONE_EVENT_NAME.to_string()
}

fn default_error_code() -> i32 {
    DEFAULT_ERROR_CODE
}

/// Content kind discriminator
///
/// Adding a kind means adding a variant here and in [`ResponseEvent`]; every `match`
/// over either enum then fails to compile until it handles the new kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ContentType {
    #[serde(rename = "atomic.json")]
    Json,
    #[serde(rename = "atomic.textblock")]
    TextBlock,
    #[serde(rename = "chunked.text")]
    TextStream,
    #[serde(rename = "atomic.error")]
    Error,
    #[serde(rename = "atomic.done")]
    Done,
}

impl ContentType {
    pub const ALL: [ContentType; 5] = [
        ContentType::Json,
        ContentType::TextBlock,
        ContentType::TextStream,
        ContentType::Error,
        ContentType::Done,
    ];

    /// Wire value used both as `content_type` and as the SSE `event:` type
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Json => "atomic.json",
            ContentType::TextBlock => "atomic.textblock",
            ContentType::TextStream => "chunked.text",
            ContentType::Error => "atomic.error",
            ContentType::Done => "atomic.done",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = UnknownContentType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContentType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownContentType(s.to_string()))
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("unknown content type: {0}")]
pub struct UnknownContentType(pub String);

/// Metadata values are restricted to scalars
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

pub type Metadata = BTreeMap<String, MetadataValue>;

/// Structured JSON document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DocumentEvent {
    pub id: Identifier,
    #[schemars(length(min = 1))]
    pub event_name: String,
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[schemars(length(min = 1))]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    pub content: Map<String, Value>,
}

/// Complete block of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TextBlockEvent {
    pub id: Identifier,
    #[schemars(length(min = 1))]
    pub event_name: String,
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[schemars(length(min = 1))]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    pub content: String,
}

/// One piece of an incrementally delivered text stream
///
/// Chunks sharing a `stream_id` arrive in emission order; the last one has
/// `is_complete` set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TextChunkEvent {
    pub id: Identifier,
    #[schemars(length(min = 1))]
    pub event_name: String,
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[schemars(length(min = 1))]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[schemars(length(min = 1))]
    pub stream_id: String,
    pub is_complete: bool,
    pub content: String,
}

/// Error payload carried by [`ErrorEvent`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorContent {
    #[schemars(length(min = 1))]
    pub error_message: String,
    #[serde(default = "default_error_code")]
    #[schemars(schema_with = "error_code_schema")]
    pub error_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
}

/// `error_code` bounded to the 32-bit range it deserializes into
fn error_code_schema(gen: &mut SchemaGenerator) -> Schema {
    let mut schema = i32::json_schema(gen).into_object();
    let number = schema.number();
    number.minimum = Some(f64::from(i32::MIN));
    number.maximum = Some(f64::from(i32::MAX));
    schema.into()
}

impl ErrorContent {
    pub fn new(error_message: impl Into<String>) -> Self {
        Self {
            error_message: error_message.into(),
            error_code: DEFAULT_ERROR_CODE,
            details: None,
        }
    }

    pub fn with_code(mut self, error_code: i32) -> Self {
        self.error_code = error_code;
        self
    }

    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = Some(details);
        self
    }
}

/// Failure reported by the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorEvent {
    pub id: Identifier,
    #[serde(default = "default_error_event_name")]
    pub event_name: String,
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[schemars(length(min = 1))]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    pub content: ErrorContent,
}

/// Terminal marker for one request's response sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DoneEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Identifier>,
    #[serde(default = "default_done_event_name")]
    pub event_name: String,
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Default for DoneEvent {
    fn default() -> Self {
        Self {
            id: None,
            event_name: default_done_event_name(),
            schema_version: default_schema_version(),
            source: None,
            metadata: None,
        }
    }
}

/// Closed union of response events, tagged by `content_type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "content_type")]
pub enum ResponseEvent {
    #[serde(rename = "atomic.json")]
    Document(DocumentEvent),
    #[serde(rename = "atomic.textblock")]
    TextBlock(TextBlockEvent),
    #[serde(rename = "chunked.text")]
    TextChunk(TextChunkEvent),
    #[serde(rename = "atomic.error")]
    Error(ErrorEvent),
    #[serde(rename = "atomic.done")]
    Done(DoneEvent),
}

impl ResponseEvent {
    pub fn content_type(&self) -> ContentType {
        match self {
            ResponseEvent::Document(_) => ContentType::Json,
            ResponseEvent::TextBlock(_) => ContentType::TextBlock,
            ResponseEvent::TextChunk(_) => ContentType::TextStream,
            ResponseEvent::Error(_) => ContentType::Error,
            ResponseEvent::Done(_) => ContentType::Done,
        }
    }

    pub fn event_name(&self) -> &str {
        match self {
            ResponseEvent::Document(e) => &e.event_name,
            ResponseEvent::TextBlock(e) => &e.event_name,
            ResponseEvent::TextChunk(e) => &e.event_name,
            ResponseEvent::Error(e) => &e.event_name,
            ResponseEvent::Done(e) => &e.event_name,
        }
    }

    pub fn id(&self) -> Option<&Identifier> {
        match self {
            ResponseEvent::Document(e) => Some(&e.id),
            ResponseEvent::TextBlock(e) => Some(&e.id),
            ResponseEvent::TextChunk(e) => Some(&e.id),
            ResponseEvent::Error(e) => Some(&e.id),
            ResponseEvent::Done(e) => e.id.as_ref(),
        }
    }

    pub fn source(&self) -> Option<&str> {
        match self {
            ResponseEvent::Document(e) => Some(&e.source),
            ResponseEvent::TextBlock(e) => Some(&e.source),
            ResponseEvent::TextChunk(e) => Some(&e.source),
            ResponseEvent::Error(e) => Some(&e.source),
            ResponseEvent::Done(e) => e.source.as_deref(),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, ResponseEvent::Done(_))
    }
}

impl Contract for DocumentEvent {
    fn check(&self, scope: &mut Scope<'_>) {
        scope.identifier("id", &self.id);
    }
}

impl Contract for TextBlockEvent {
    fn check(&self, scope: &mut Scope<'_>) {
        scope.identifier("id", &self.id);
    }
}

impl Contract for TextChunkEvent {
    fn check(&self, scope: &mut Scope<'_>) {
        scope.identifier("id", &self.id);
    }
}

impl Contract for ErrorEvent {
    fn check(&self, scope: &mut Scope<'_>) {
        scope.identifier("id", &self.id);
        scope.fixed("event_name", &self.event_name, ERROR_EVENT_NAME);
    }
}

impl Contract for DoneEvent {
    fn check(&self, scope: &mut Scope<'_>) {
        if let Some(id) = &self.id {
            scope.identifier("id", id);
        }
        scope.fixed("event_name", &self.event_name, DONE_EVENT_NAME);
    }
}

/// Selects the variant schema by `content_type` with `if`/`then` branches, so a
/// violation inside a nested event is reported at its own field path.
impl JsonSchema for ResponseEvent {
    fn schema_name() -> String {
        "ResponseEvent".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        let branches = ContentType::ALL
            .iter()
            .map(|kind| {
                let variant = match kind {
                    ContentType::Json => gen.subschema_for::<DocumentEvent>(),
                    ContentType::TextBlock => gen.subschema_for::<TextBlockEvent>(),
                    ContentType::TextStream => gen.subschema_for::<TextChunkEvent>(),
                    ContentType::Error => gen.subschema_for::<ErrorEvent>(),
                    ContentType::Done => gen.subschema_for::<DoneEvent>(),
                };
                let tagged = SchemaObject {
                    const_value: Some(Value::String(kind.as_str().to_string())),
                    ..Default::default()
                };
                let condition = SchemaObject {
                    object: Some(Box::new(ObjectValidation {
                        properties: [("content_type".to_string(), tagged.into())]
                            .into_iter()
                            .collect(),
                        required: ["content_type".to_string()].into_iter().collect(),
                        ..Default::default()
                    })),
                    ..Default::default()
                };
                SchemaObject {
                    subschemas: Some(Box::new(SubschemaValidation {
                        if_schema: Some(Box::new(condition.into())),
                        then_schema: Some(Box::new(variant)),
                        ..Default::default()
                    })),
                    ..Default::default()
                }
                .into()
            })
            .collect::<Vec<Schema>>();

        let discriminator = SchemaObject {
            instance_type: Some(InstanceType::String.into()),
            enum_values: Some(
                ContentType::ALL
                    .iter()
                    .map(|kind| Value::String(kind.as_str().to_string()))
                    .collect(),
            ),
            ..Default::default()
        };

        SchemaObject {
            instance_type: Some(InstanceType::Object.into()),
            object: Some(Box::new(ObjectValidation {
                properties: [("content_type".to_string(), discriminator.into())]
                    .into_iter()
                    .collect(),
                required: ["content_type".to_string()].into_iter().collect(),
                ..Default::default()
            })),
            subschemas: Some(Box::new(SubschemaValidation {
                all_of: Some(branches),
                ..Default::default()
            })),
            ..Default::default()
        }
        .into()
    }
}

impl Contract for ResponseEvent {
    fn check(&self, scope: &mut Scope<'_>) {
        match self {
            ResponseEvent::Document(e) => e.check(scope),
            ResponseEvent::TextBlock(e) => e.check(scope),
            ResponseEvent::TextChunk(e) => e.check(scope),
            ResponseEvent::Error(e) => e.check(scope),
            ResponseEvent::Done(e) => e.check(scope),
        }
    }
}

/// Progress of one reassembled text stream
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssembledText {
    pub text: String,
    pub chunks: usize,
    pub complete: bool,
}

/// Chunk ordering violations
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AssemblyError {
    #[error("chunk received for stream {0} after it completed")]
    StreamAlreadyComplete(String),
}

/// Reassembles text streams from [`TextChunkEvent`]s in arrival order
#[derive(Debug, Default)]
pub struct TextStreamAssembler {
    streams: BTreeMap<String, AssembledText>,
    order: Vec<String>,
}

impl TextStreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return the stream's state after it
    pub fn push(&mut self, chunk: &TextChunkEvent) -> Result<&AssembledText, AssemblyError> {
        if !self.streams.contains_key(&chunk.stream_id) {
            self.order.push(chunk.stream_id.clone());
        }
        let entry = self.streams.entry(chunk.stream_id.clone()).or_default();
        if entry.complete {
            return Err(AssemblyError::StreamAlreadyComplete(
                chunk.stream_id.clone(),
            ));
        }
        entry.text.push_str(&chunk.content);
        entry.chunks += 1;
        entry.complete = chunk.is_complete;
        Ok(entry)
    }

    pub fn get(&self, stream_id: &str) -> Option<&AssembledText> {
        self.streams.get(stream_id)
    }

    /// Stream ids in the order their first chunk arrived
    pub fn stream_ids(&self) -> &[String] {
        &self.order
    }

    pub fn all_complete(&self) -> bool {
        self.streams.values().all(|s| s.complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunk(stream_id: &str, content: &str, is_complete: bool) -> TextChunkEvent {
        TextChunkEvent {
            id: Identifier::generate(),
            event_name: "final_response".to_string(),
            schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
            source: "agent".to_string(),
            metadata: None,
            stream_id: stream_id.to_string(),
            is_complete,
            content: content.to_string(),
        }
    }

    #[test]
    fn test_content_type_wire_values_round_trip() {
        for kind in ContentType::ALL {
            assert_eq!(kind.as_str().parse::<ContentType>().unwrap(), kind);
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, json!(kind.as_str()));
        }
        assert!("atomic.unknown".parse::<ContentType>().is_err());
    }

    #[test]
    fn test_response_event_serializes_with_discriminator() {
        let event = ResponseEvent::TextChunk(chunk("s1", "Hello", false));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["content_type"], "chunked.text");
        assert_eq!(json["stream_id"], "s1");
        assert_eq!(json["is_complete"], false);
        assert_eq!(event.content_type(), ContentType::TextStream);
    }

    #[test]
    fn test_done_event_defaults() {
        let event: ResponseEvent =
            serde_json::from_value(json!({"content_type": "atomic.done"})).unwrap();
        match event {
            ResponseEvent::Done(done) => {
                assert_eq!(done.event_name, DONE_EVENT_NAME);
                assert_eq!(done.schema_version, DEFAULT_SCHEMA_VERSION);
                assert!(done.id.is_none());
            }
            other => panic!("expected done, got {other:?}"),
        }
    }

    #[test]
    fn test_error_content_defaults_code() {
        let content: ErrorContent =
            serde_json::from_value(json!({"error_message": "boom"})).unwrap();
        assert_eq!(content.error_code, DEFAULT_ERROR_CODE);
        assert!(content.details.is_none());
    }

    #[test]
    fn test_metadata_values_are_scalars() {
        let metadata: Metadata = serde_json::from_value(json!({
            "flag": true,
            "count": 3,
            "ratio": 0.5,
            "label": "x"
        }))
        .unwrap();
        assert_eq!(metadata["flag"], MetadataValue::Bool(true));
        assert_eq!(metadata["count"], MetadataValue::Integer(3));
        assert_eq!(metadata["ratio"], MetadataValue::Float(0.5));
        assert_eq!(metadata["label"], MetadataValue::Text("x".to_string()));
    }

    #[test]
    fn test_assembler_concatenates_in_order() {
        let mut assembler = TextStreamAssembler::new();
        assembler.push(&chunk("s1", "Hello, ", false)).unwrap();
        assembler.push(&chunk("s2", "other", true)).unwrap();
        let state = assembler.push(&chunk("s1", "world", true)).unwrap();

        assert_eq!(state.text, "Hello, world");
        assert_eq!(state.chunks, 2);
        assert!(state.complete);
        assert_eq!(assembler.stream_ids(), ["s1".to_string(), "s2".to_string()]);
        assert!(assembler.all_complete());
    }

    #[test]
    fn test_assembler_rejects_chunk_after_completion() {
        let mut assembler = TextStreamAssembler::new();
        assembler.push(&chunk("s1", "done", true)).unwrap();
        let err = assembler.push(&chunk("s1", "late", false)).unwrap_err();
        assert_eq!(err, AssemblyError::StreamAlreadyComplete("s1".to_string()));
    }
}

//! Metadata-only log events
//!
//! The only observability surface that sees an invocation. A [`LogEvent`]
//! has exactly three fields (correlation id, event type, timestamp), so
//! content, credentials and labels cannot reach a log sink through it.
//!
//! ```text
//! RemoteClassifier ──► received / completed / error(kind)
//! InvocationClient ──► error(kind) / fallback          ──► LogSink
//! FallbackPath     ──► fallback
//! ```

mod sink;

pub use sink::{LogSink, MemorySink, TracingSink};

use crate::error::FailureKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Caller-generated correlation identifier.
///
/// Always a UUID: deserialization rejects anything else, so no content can
/// travel in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a new random correlation id
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from its string form
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Kind of log event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "kind", rename_all = "snake_case")]
pub enum EventType {
    /// Classifier accepted an invocation
    Received,
    /// Classifier returned a sealed result
    Completed,
    /// Client switched to the direct provider path
    Fallback,
    /// Something failed; the kind is a content-free code
    Error(FailureKind),
}

impl EventType {
    /// Stable event name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Completed => "completed",
            Self::Fallback => "fallback",
            Self::Error(_) => "error",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error(kind) => write!(f, "error:{}", kind),
            other => f.write_str(other.as_str()),
        }
    }
}

/// A single metadata-only log event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub correlation_id: CorrelationId,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
}

impl LogEvent {
    /// Create an event stamped with the current time
    pub fn new(correlation_id: CorrelationId, event_type: EventType) -> Self {
        Self {
            correlation_id,
            event_type,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_id_rejects_non_uuid() {
        let parsed: Result<CorrelationId, _> =
            serde_json::from_str("\"Hi, following up on the term sheet\"");
        assert!(parsed.is_err());
        assert!(CorrelationId::parse("term sheet").is_none());
    }

    #[test]
    fn test_correlation_id_roundtrip_string() {
        let id = CorrelationId::generate();
        assert_eq!(CorrelationId::parse(&id.to_string()), Some(id));
    }

    #[test]
    fn test_event_serialization_shape() {
        let id = CorrelationId::generate();
        let event = LogEvent::new(id, EventType::Error(FailureKind::Decryption));
        let json = serde_json::to_value(&event).unwrap();

        let fields: Vec<&str> = json.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(fields.len(), 3);
        assert_eq!(json["event_type"]["type"], "error");
        assert_eq!(json["event_type"]["kind"], "decryption");
        assert_eq!(json["correlation_id"], id.to_string());
    }

    #[test]
    fn test_event_type_display() {
        assert_eq!(EventType::Received.to_string(), "received");
        assert_eq!(EventType::Fallback.to_string(), "fallback");
        assert_eq!(
            EventType::Error(FailureKind::ChannelTimeout).to_string(),
            "error:channel_timeout"
        );
    }
}

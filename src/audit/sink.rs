//! Log sinks for [`LogEvent`]s

use super::{EventType, LogEvent};
use std::sync::Mutex;

/// Destination for metadata-only log events.
///
/// Accepts `LogEvent` and nothing else; there is no way to hand a sink a
/// free-form message.
pub trait LogSink: Send + Sync {
    fn emit(&self, event: LogEvent);
}

/// Emits events through `tracing` on the `confidant::audit` target.
///
/// With the JSON formatter this yields one structured line per event,
/// which is what the retention-limited log sink ingests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, event: LogEvent) {
        let kind = match event.event_type {
            EventType::Error(kind) => Some(kind.as_str()),
            _ => None,
        };
        tracing::info!(
            target: "confidant::audit",
            correlation_id = %event.correlation_id,
            event = event.event_type.as_str(),
            kind = kind,
            timestamp = %event.timestamp.to_rfc3339(),
            "audit"
        );
    }
}

/// Keeps events in memory (tests, `doctor` dry runs).
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<LogEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events
    pub fn events(&self) -> Vec<LogEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Event types in emission order
    pub fn event_types(&self) -> Vec<EventType> {
        self.events().into_iter().map(|e| e.event_type).collect()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

impl LogSink for MemorySink {
    fn emit(&self, event: LogEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}

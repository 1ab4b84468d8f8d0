use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Event Envelope
// ============================================================================
//
// Stream position, correlation and the acting user travel with every
// event. `metadata` holds free-form tags such as `from_status`/`to_status`.
//
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EventEnvelope<E> {
    pub event_id: Uuid,
    pub aggregate_id: String,
    /// 1-based position in the stream, assigned by the store on append
    pub sequence_number: i64,
    pub event_type: String,
    pub event_data: E,
    /// Shared by every event written for one caller operation
    pub correlation_id: Uuid,
    /// Operator, approver or "system"
    pub actor: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        aggregate_id: impl Into<String>,
        sequence_number: i64,
        event_type: impl Into<String>,
        event_data: E,
        correlation_id: Uuid,
    ) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            aggregate_id: aggregate_id.into(),
            sequence_number,
            event_type: event_type.into(),
            event_data,
            correlation_id,
            actor: None,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Payload types the event store accepts
pub trait DomainEvent: Serialize + for<'de> Deserialize<'de> + Clone + Send + Sync {
    fn event_type() -> &'static str where Self: Sized;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
    struct SampleEvent {
        data: String,
    }

    impl DomainEvent for SampleEvent {
        fn event_type() -> &'static str { "SampleEvent" }
    }

    #[test]
    fn test_envelope_carries_actor_and_metadata() {
        let correlation_id = Uuid::new_v4();
        let envelope = EventEnvelope::new(
            "PCO-20260204-001",
            1,
            SampleEvent::event_type(),
            SampleEvent { data: "x".to_string() },
            correlation_id,
        )
        .with_actor("zhang.san")
        .with_metadata("to_status", "APPROVED");

        assert_eq!(envelope.aggregate_id, "PCO-20260204-001");
        assert_eq!(envelope.event_type, "SampleEvent");
        assert_eq!(envelope.actor.as_deref(), Some("zhang.san"));
        assert_eq!(envelope.metadata.get("to_status").map(String::as_str), Some("APPROVED"));
        assert_eq!(envelope.correlation_id, correlation_id);
    }

    #[test]
    fn test_envelope_json_shape() {
        let envelope = EventEnvelope::new("a", 3, "SampleEvent", SampleEvent { data: "payload".into() }, Uuid::new_v4());
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["sequence_number"], 3);
        assert_eq!(json["event_data"]["data"], "payload");

        let back: EventEnvelope<SampleEvent> = serde_json::from_value(json).unwrap();
        assert_eq!(back.event_data, envelope.event_data);
    }
}

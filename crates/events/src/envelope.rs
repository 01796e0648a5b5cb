use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::event::Event;

/// Envelope for a published event, carrying the metadata subscribers route on.
///
/// `payload` is the serialized domain event; subscribers that understand
/// `event_type` deserialize it back into the typed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    event_type: String,
    event_version: u32,
    subject_id: String,
    occurred_at: DateTime<Utc>,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        event_type: impl Into<String>,
        event_version: u32,
        subject_id: impl Into<String>,
        occurred_at: DateTime<Utc>,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            event_type: event_type.into(),
            event_version,
            subject_id: subject_id.into(),
            occurred_at,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn event_version(&self) -> u32 {
        self.event_version
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

impl EventEnvelope<JsonValue> {
    /// Wrap a typed event into a JSON envelope with a fresh time-ordered id.
    pub fn from_typed<T>(event: &T) -> Result<Self, serde_json::Error>
    where
        T: Event + Serialize,
    {
        let payload = serde_json::to_value(event)?;
        Ok(Self::new(
            Uuid::now_v7(),
            event.event_type(),
            event.version(),
            event.subject_id(),
            event.occurred_at(),
            payload,
        ))
    }
}

//! Events handed over by the event bus and the messages built from them.

use serde::Serialize;

/// Event type name used by the event bus for custom (subclassed) events.
pub const CUSTOM_EVENT: &str = "CUSTOM";

/// An event as delivered by the event bus, one at a time.
#[derive(Clone, Debug, PartialEq)]
pub struct IncomingEvent {
    /// Event type name (e.g. "CHANNEL_CREATE")
    pub name: String,
    /// Subclass, only set for custom events
    pub subclass: Option<String>,
    /// Structured payload, serialized to JSON before queueing
    pub body: serde_json::Value,
}

impl IncomingEvent {
    /// Create a regular event.
    pub fn new(name: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            subclass: None,
            body,
        }
    }

    /// Create a custom event carrying the given subclass.
    pub fn custom(subclass: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            name: CUSTOM_EVENT.to_string(),
            subclass: Some(subclass.into()),
            body,
        }
    }

    /// Whether this is a custom event.
    pub fn is_custom(&self) -> bool {
        self.name == CUSTOM_EVENT
    }
}

/// A serialized event waiting for delivery.
///
/// Messages are immutable and intentionally not `Clone`: a message is owned
/// by the queue while queued and by the worker while in flight. Requeueing
/// after a transport failure moves the same value back into the queue.
#[derive(Debug, PartialEq, Eq)]
pub struct Message {
    event_name: String,
    payload: String,
}

impl Message {
    /// Create a message from an already serialized payload.
    pub fn new(event_name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            event_name: event_name.into(),
            payload: payload.into(),
        }
    }

    /// Create a message with a JSON-serialized payload.
    pub fn encode<T: Serialize + ?Sized>(
        event_name: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        let payload = serde_json::to_string(payload)?;
        Ok(Self::new(event_name, payload))
    }

    /// Serialize an incoming bus event.
    pub fn from_event(event: &IncomingEvent) -> Result<Self, serde_json::Error> {
        Self::encode(event.name.clone(), &event.body)
    }

    /// Event type name.
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// Serialized payload.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Payload as bytes, as handed to the broker.
    pub fn payload_bytes(&self) -> &[u8] {
        self.payload.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encode_serializes_payload_to_json() {
        let msg = Message::encode("CHANNEL_CREATE", &json!({"uuid": "abc"})).unwrap();
        assert_eq!(msg.event_name(), "CHANNEL_CREATE");
        assert_eq!(msg.payload(), r#"{"uuid":"abc"}"#);
    }

    #[test]
    fn from_event_keeps_event_name() {
        let event = IncomingEvent::custom("sofia::register", json!({"user": "1000"}));
        assert!(event.is_custom());

        let msg = Message::from_event(&event).unwrap();
        assert_eq!(msg.event_name(), CUSTOM_EVENT);
        assert_eq!(msg.payload_bytes(), br#"{"user":"1000"}"#);
    }
}

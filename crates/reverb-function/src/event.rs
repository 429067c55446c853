use serde::{Deserialize, Serialize};

/// An event delivered to a function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub payload: Option<serde_json::Value>,
}

impl Event {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      payload: None,
    }
  }

  pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
    self.payload = Some(payload);
    self
  }
}

/// An event accepted by the ingress, tagged with the id it was logged under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedEvent {
  pub event_id: String,
  pub event: Event,
}

impl ReceivedEvent {
  pub fn new(event_id: impl Into<String>, event: Event) -> Self {
    Self {
      event_id: event_id.into(),
      event,
    }
  }
}

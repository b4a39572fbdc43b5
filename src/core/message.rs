//! Message envelope and processing outcome types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::clock::now_ms;

/// A message moving through the engine.
///
/// Timestamps are milliseconds since the Unix epoch and record the envelope's
/// progress: creation, receipt from a source, processing completion, and
/// hand-off to the next topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Opaque message identifier.
    pub id: Uuid,
    /// Topic the message currently belongs to.
    pub topic: String,
    /// Creation timestamp.
    pub created_at_ms: u128,
    /// Set by the source when the message is polled.
    pub received_at_ms: Option<u128>,
    /// Set when processing finished successfully.
    pub completed_at_ms: Option<u128>,
    /// Set by the publisher when the message is sent onward.
    pub sent_at_ms: Option<u128>,
    /// Typed payload, opaque to the engine.
    pub payload: serde_json::Value,
}

impl Message {
    /// Create a new message on a topic with the given payload.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            created_at_ms: now_ms(),
            received_at_ms: None,
            completed_at_ms: None,
            sent_at_ms: None,
            payload,
        }
    }
}

/// Status transitions recorded through the logging capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageStatus {
    /// Polled from a source.
    Received,
    /// Handed to a processor.
    Processing,
    /// Processing finished and the message was acknowledged.
    Completed,
    /// Processing failed; the message stays unacknowledged.
    Failed,
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Received => write!(f, "Received"),
            Self::Processing => write!(f, "Processing"),
            Self::Completed => write!(f, "Completed"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Result of handing one message to a processor.
#[derive(Debug, Clone, Default)]
pub struct ProcessingOutcome {
    /// Whether the processor handled the message successfully.
    pub success: bool,
    /// Failure detail when `success` is false.
    pub error_message: Option<String>,
    /// Messages emitted by the processor, broadcast to every output topic.
    pub output_messages: Vec<Message>,
}

impl ProcessingOutcome {
    /// Successful outcome with no emitted messages.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            error_message: None,
            output_messages: Vec::new(),
        }
    }

    /// Successful outcome emitting the given messages.
    #[must_use]
    pub fn ok_with(output_messages: Vec<Message>) -> Self {
        Self {
            success: true,
            error_message: None,
            output_messages,
        }
    }

    /// Failed outcome with a reason.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(reason.into()),
            output_messages: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_message_has_id_and_creation_time() {
        let msg = Message::new("orders", serde_json::json!({"n": 1}));
        assert_eq!(msg.topic, "orders");
        assert!(msg.created_at_ms > 0);
        assert!(msg.received_at_ms.is_none());
        assert!(msg.completed_at_ms.is_none());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(MessageStatus::Processing.to_string(), "Processing");
        assert_eq!(MessageStatus::Failed.to_string(), "Failed");
    }

    #[test]
    fn test_outcome_constructors() {
        assert!(ProcessingOutcome::ok().success);
        let failed = ProcessingOutcome::failed("boom");
        assert!(!failed.success);
        assert_eq!(failed.error_message.as_deref(), Some("boom"));
        let with = ProcessingOutcome::ok_with(vec![Message::new("t", serde_json::json!(null))]);
        assert_eq!(with.output_messages.len(), 1);
    }
}

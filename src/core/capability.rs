//! Capability contracts consumed by the engine.
//!
//! These are the seams between the engine core and its collaborators: where
//! messages come from, what processes them, where emitted messages go, and
//! how status transitions are recorded. Concrete backends live in
//! [`crate::infra`].

use async_trait::async_trait;
use uuid::Uuid;

use crate::core::message::{Message, MessageStatus, ProcessingOutcome};
use crate::core::stats::ProcessorStatistics;
use crate::core::EngineError;

/// A pollable origin of pending messages.
///
/// Implementations own redelivery semantics: a polled but never acknowledged
/// message must become pollable again. Concurrent-safe polling across
/// processes (claim-on-read) is likewise the source's responsibility.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Return up to `max` pending messages on `topic`, oldest created first,
    /// marking them received as a side effect.
    async fn poll(&self, topic: &str, max: usize) -> Result<Vec<Message>, EngineError>;

    /// Mark a message complete. Best effort; implementations swallow their
    /// own backend errors where possible.
    async fn acknowledge(&self, id: Uuid) -> Result<(), EngineError>;

    /// Health probe.
    async fn healthy(&self) -> bool;
}

/// Unit of logic consuming one message, optionally emitting further messages.
///
/// A panic escaping `process` is tolerated by the engine and treated as a
/// generic failure for that message only.
#[async_trait]
pub trait MessageProcessor: Send + Sync {
    /// Process a single message.
    async fn process(&self, message: &Message) -> ProcessingOutcome;
}

/// Fan-out publisher writing messages to every registered sink for a topic.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Stamp `topic` and a sent timestamp on the message, then write it
    /// concurrently to every sink accepting the topic. If any sink write
    /// fails the whole call fails; already-succeeded writes are not rolled
    /// back.
    async fn publish(&self, message: Message, topic: &str) -> Result<(), EngineError>;

    /// Publish each message independently and concurrently. The same
    /// non-atomic semantics apply per message; the first failure is
    /// reported after all publishes have settled.
    async fn publish_batch(&self, messages: Vec<Message>, topic: &str)
        -> Result<(), EngineError>;
}

/// A concrete destination capable of receiving published messages.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Deliver one message to this sink.
    async fn deliver(&self, message: Message) -> Result<(), EngineError>;

    /// Whether this sink receives messages for the given topic.
    fn accepts(&self, _topic: &str) -> bool {
        true
    }
}

/// Best-effort recording of message status transitions and statistics
/// snapshots.
///
/// Implementations must swallow their own failures; the engine treats both
/// operations as fire-and-forget and never aborts processing over a logging
/// error.
#[async_trait]
pub trait MessageLogger: Send + Sync {
    /// Record a status transition for a message.
    async fn log_message(&self, message: &Message, status: MessageStatus, error: Option<&str>);

    /// Record a statistics snapshot.
    async fn log_statistics(&self, stats: &ProcessorStatistics);
}

//! Fan-out publisher and sink implementations.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::core::capability::{MessagePublisher, MessageSink};
use crate::core::message::Message;
use crate::core::EngineError;
use crate::infra::source::InMemorySource;
use crate::util::clock::now_ms;

/// Publisher writing every message to all registered sinks that accept its
/// topic.
///
/// Fan-out is not atomic: all sink writes are awaited together, and if any
/// fails the whole publish call fails while already-succeeded writes stay
/// delivered.
pub struct FanOutPublisher {
    sinks: RwLock<Vec<Arc<dyn MessageSink>>>,
}

impl FanOutPublisher {
    /// Create a publisher with no sinks.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sinks: RwLock::new(Vec::new()),
        }
    }

    /// Register a sink.
    pub fn register_sink(&self, sink: Arc<dyn MessageSink>) {
        self.sinks.write().push(sink);
    }
}

impl Default for FanOutPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagePublisher for FanOutPublisher {
    async fn publish(&self, mut message: Message, topic: &str) -> Result<(), EngineError> {
        message.topic = topic.to_owned();
        message.sent_at_ms = Some(now_ms());

        let sinks: Vec<Arc<dyn MessageSink>> = self
            .sinks
            .read()
            .iter()
            .filter(|sink| sink.accepts(topic))
            .cloned()
            .collect();
        if sinks.is_empty() {
            debug!(topic = %topic, "no sinks accept topic, message dropped");
            return Ok(());
        }

        let writes = sinks.iter().map(|sink| sink.deliver(message.clone()));
        let results = futures::future::join_all(writes).await;
        let failures: Vec<String> = results
            .into_iter()
            .filter_map(|result| result.err().map(|e| e.to_string()))
            .collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Publish(format!(
                "{} of {} sink writes failed: {}",
                failures.len(),
                sinks.len(),
                failures.join("; ")
            )))
        }
    }

    async fn publish_batch(
        &self,
        messages: Vec<Message>,
        topic: &str,
    ) -> Result<(), EngineError> {
        let publishes = messages
            .into_iter()
            .map(|message| self.publish(message, topic));
        let results = futures::future::join_all(publishes).await;
        // Each message publishes independently; report the first failure
        // after all have settled.
        results.into_iter().find(Result::is_err).unwrap_or(Ok(()))
    }
}

/// Sink capturing delivered messages in memory.
pub struct InMemorySink {
    messages: Mutex<Vec<Message>>,
}

impl InMemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of every delivered message.
    #[must_use]
    pub fn delivered(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }

    /// Number of delivered messages on a topic.
    #[must_use]
    pub fn delivered_for(&self, topic: &str) -> usize {
        self.messages
            .lock()
            .iter()
            .filter(|message| message.topic == topic)
            .count()
    }
}

impl Default for InMemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageSink for InMemorySink {
    async fn deliver(&self, message: Message) -> Result<(), EngineError> {
        self.messages.lock().push(message);
        Ok(())
    }
}

/// Sink feeding published messages back into a pollable source, so output
/// topics of one processor become input topics of the next.
pub struct SourceSink {
    source: Arc<InMemorySource>,
}

impl SourceSink {
    /// Create a sink writing into the given source.
    #[must_use]
    pub fn new(source: Arc<InMemorySource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl MessageSink for SourceSink {
    async fn deliver(&self, message: Message) -> Result<(), EngineError> {
        let topic = message.topic.clone();
        self.source.push(&topic, message);
        Ok(())
    }
}

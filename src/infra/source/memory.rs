//! In-memory message source for embedding and tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::core::capability::MessageSource;
use crate::core::message::Message;
use crate::core::EngineError;

/// How long a polled message stays invisible before it is redelivered.
const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

struct Stored {
    message: Message,
    claimed_at_ms: Option<u128>,
}

/// Cache-style in-memory source with claim-on-poll semantics.
///
/// A polled message is claimed and stays invisible for the visibility
/// timeout; if it is never acknowledged it becomes pollable again, which is
/// the source-level redelivery the engine relies on for failed messages.
pub struct InMemorySource {
    topics: Mutex<HashMap<String, Vec<Stored>>>,
    visibility_timeout_ms: u128,
}

impl InMemorySource {
    /// Create a source with the default 30-second visibility timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_visibility_timeout(DEFAULT_VISIBILITY_TIMEOUT)
    }

    /// Create a source with an explicit visibility timeout.
    #[must_use]
    pub fn with_visibility_timeout(timeout: Duration) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            visibility_timeout_ms: timeout.as_millis(),
        }
    }

    /// Enqueue a message on a topic.
    pub fn push(&self, topic: &str, mut message: Message) {
        message.topic = topic.to_owned();
        self.topics
            .lock()
            .entry(topic.to_owned())
            .or_default()
            .push(Stored {
                message,
                claimed_at_ms: None,
            });
    }

    /// Number of unacknowledged messages on a topic, claimed or not.
    #[must_use]
    pub fn depth(&self, topic: &str) -> usize {
        self.topics.lock().get(topic).map_or(0, Vec::len)
    }
}

impl Default for InMemorySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageSource for InMemorySource {
    async fn poll(&self, topic: &str, max: usize) -> Result<Vec<Message>, EngineError> {
        let now = crate::util::clock::now_ms();
        let mut topics = self.topics.lock();
        let Some(entries) = topics.get_mut(topic) else {
            return Ok(Vec::new());
        };
        entries.sort_by_key(|stored| stored.message.created_at_ms);

        let mut polled = Vec::new();
        for stored in entries.iter_mut() {
            if polled.len() >= max {
                break;
            }
            let visible = match stored.claimed_at_ms {
                None => true,
                Some(at) => now.saturating_sub(at) >= self.visibility_timeout_ms,
            };
            if visible {
                stored.claimed_at_ms = Some(now);
                stored.message.received_at_ms = Some(now);
                polled.push(stored.message.clone());
            }
        }
        Ok(polled)
    }

    async fn acknowledge(&self, id: Uuid) -> Result<(), EngineError> {
        let mut topics = self.topics.lock();
        for entries in topics.values_mut() {
            entries.retain(|stored| stored.message.id != id);
        }
        Ok(())
    }

    async fn healthy(&self) -> bool {
        true
    }
}

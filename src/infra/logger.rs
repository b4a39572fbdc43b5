//! Message logger implementations.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::capability::MessageLogger;
use crate::core::message::{Message, MessageStatus};
use crate::core::stats::ProcessorStatistics;
use crate::util::clock::now_ms;

/// Logger emitting status transitions through the tracing subscriber.
pub struct TracingMessageLogger;

#[async_trait]
impl MessageLogger for TracingMessageLogger {
    async fn log_message(&self, message: &Message, status: MessageStatus, error: Option<&str>) {
        match status {
            MessageStatus::Failed => warn!(
                message_id = %message.id,
                topic = %message.topic,
                error = error.unwrap_or("unknown"),
                "message failed"
            ),
            _ => info!(
                message_id = %message.id,
                topic = %message.topic,
                status = %status,
                "message status"
            ),
        }
    }

    async fn log_statistics(&self, stats: &ProcessorStatistics) {
        debug!(
            processor = %stats.name,
            total_processed = stats.total_processed,
            error_count = stats.error_count,
            messages_per_minute = stats.messages_per_minute,
            "statistics snapshot"
        );
    }
}

/// One recorded status transition.
#[derive(Debug, Clone)]
pub struct MessageLogEntry {
    /// Message identifier.
    pub message_id: Uuid,
    /// Topic at the time of the transition.
    pub topic: String,
    /// Recorded status.
    pub status: MessageStatus,
    /// Failure detail, if any.
    pub error: Option<String>,
    /// Wall-clock time of the record.
    pub at_ms: u128,
}

/// Bounded in-memory logger for tests and dashboards; the oldest entries are
/// discarded once the buffer is full.
pub struct InMemoryMessageLogger {
    entries: Mutex<VecDeque<MessageLogEntry>>,
    stats: Mutex<VecDeque<ProcessorStatistics>>,
    max_entries: usize,
}

impl InMemoryMessageLogger {
    /// Create a logger retaining at most `max_entries` records per buffer.
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(max_entries)),
            stats: Mutex::new(VecDeque::with_capacity(max_entries)),
            max_entries,
        }
    }

    /// Snapshot of recorded transitions.
    #[must_use]
    pub fn entries(&self) -> Vec<MessageLogEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Number of recorded transitions with the given status.
    #[must_use]
    pub fn count_with_status(&self, status: MessageStatus) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.status == status)
            .count()
    }

    /// Snapshot of recorded statistics.
    #[must_use]
    pub fn statistics(&self) -> Vec<ProcessorStatistics> {
        self.stats.lock().iter().cloned().collect()
    }
}

#[async_trait]
impl MessageLogger for InMemoryMessageLogger {
    async fn log_message(&self, message: &Message, status: MessageStatus, error: Option<&str>) {
        let mut entries = self.entries.lock();
        if entries.len() >= self.max_entries {
            entries.pop_front();
        }
        entries.push_back(MessageLogEntry {
            message_id: message.id,
            topic: message.topic.clone(),
            status,
            error: error.map(ToOwned::to_owned),
            at_ms: now_ms(),
        });
    }

    async fn log_statistics(&self, stats: &ProcessorStatistics) {
        let mut buffer = self.stats.lock();
        if buffer.len() >= self.max_entries {
            buffer.pop_front();
        }
        buffer.push_back(stats.clone());
    }
}

enum LogCommand {
    Message {
        message: Message,
        status: MessageStatus,
        error: Option<String>,
    },
    Statistics(ProcessorStatistics),
}

/// Logger decoupling callers from a slow inner sink through a bounded queue.
///
/// Records are handed to a background drain task; when the queue is full new
/// records are dropped and counted rather than blocking the processing path
/// or spawning unbounded tasks.
pub struct BackgroundMessageLogger {
    tx: mpsc::Sender<LogCommand>,
    dropped: Arc<AtomicU64>,
}

impl BackgroundMessageLogger {
    /// Wrap `inner` with a queue of the given capacity. Must be called from
    /// within a tokio runtime; the drain task exits when the logger is
    /// dropped.
    #[must_use]
    pub fn new(inner: Arc<dyn MessageLogger>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<LogCommand>(capacity);
        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    LogCommand::Message {
                        message,
                        status,
                        error,
                    } => {
                        inner
                            .log_message(&message, status, error.as_deref())
                            .await;
                    }
                    LogCommand::Statistics(stats) => inner.log_statistics(&stats).await,
                }
            }
        });
        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Records dropped because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn enqueue(&self, command: LogCommand) {
        if let Err(mpsc::error::TrySendError::Full(_)) = self.tx.try_send(command) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            warn!("log queue full, dropping record");
        }
    }
}

#[async_trait]
impl MessageLogger for BackgroundMessageLogger {
    async fn log_message(&self, message: &Message, status: MessageStatus, error: Option<&str>) {
        self.enqueue(LogCommand::Message {
            message: message.clone(),
            status,
            error: error.map(ToOwned::to_owned),
        });
    }

    async fn log_statistics(&self, stats: &ProcessorStatistics) {
        self.enqueue(LogCommand::Statistics(stats.clone()));
    }
}

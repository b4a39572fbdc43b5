//! Per-processor polling loop with bounded concurrency.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ProcessorConfig;
use crate::core::capability::{MessageLogger, MessageProcessor, MessagePublisher, MessageSource};
use crate::core::message::{Message, MessageStatus};
use crate::core::stats::{ProcessorStatistics, StatsBlock};
use crate::util::clock::now_ms;

/// Fixed number of messages requested from the source per iteration.
pub(crate) const POLL_BATCH_SIZE: usize = 10;

/// Back-off applied after an iteration-level failure before retrying.
const LOOP_FAILURE_BACKOFF: Duration = Duration::from_secs(30);

/// The running or stopped execution context for one configured processor
/// name.
///
/// An instance owns a cancellation token, the background loop task, and the
/// lock-protected statistics block shared by concurrently processed
/// messages. Instances are created by the engine on `start` and replaced
/// wholesale when their configuration changes.
pub struct ProcessorInstance {
    config: Arc<ProcessorConfig>,
    cancel: CancellationToken,
    running: AtomicBool,
    started_at: Instant,
    frozen_uptime: Mutex<Option<Duration>>,
    stats: Arc<Mutex<StatsBlock>>,
    handle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ProcessorInstance {
    /// Create the instance and spawn its polling loop.
    pub(crate) fn start(
        config: ProcessorConfig,
        source: Arc<dyn MessageSource>,
        processor: Arc<dyn MessageProcessor>,
        publisher: Arc<dyn MessagePublisher>,
        logger: Arc<dyn MessageLogger>,
    ) -> Arc<Self> {
        let config = Arc::new(config);
        let cancel = CancellationToken::new();
        let stats = Arc::new(Mutex::new(StatsBlock::default()));
        let started_at = Instant::now();

        let poll_loop = Arc::new(PollLoop {
            config: Arc::clone(&config),
            source,
            processor,
            publisher,
            logger,
            stats: Arc::clone(&stats),
            cancel: cancel.clone(),
            gate: Arc::new(Semaphore::new(config.max_concurrency)),
            started_at,
        });
        let handle = tokio::spawn(poll_loop.run());

        Arc::new(Self {
            config,
            cancel,
            running: AtomicBool::new(true),
            started_at,
            frozen_uptime: Mutex::new(None),
            stats,
            handle: tokio::sync::Mutex::new(Some(handle)),
        })
    }

    /// Processor name this instance runs under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// True while the loop task is active and has not yet been joined.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Cancel the loop and await its completion. Redundant calls are no-ops.
    pub async fn stop(&self) {
        let mut handle = self.handle.lock().await;
        let Some(task) = handle.take() else {
            return;
        };
        self.cancel.cancel();
        if let Err(err) = task.await {
            warn!(processor = %self.config.name, error = %err, "loop task ended abnormally");
        }
        self.running.store(false, Ordering::Release);
        *self.frozen_uptime.lock() = Some(self.started_at.elapsed());
        info!(processor = %self.config.name, "processor stopped");
    }

    /// Point-in-time statistics snapshot.
    #[must_use]
    pub fn statistics(&self) -> ProcessorStatistics {
        let uptime = self
            .frozen_uptime
            .lock()
            .unwrap_or_else(|| self.started_at.elapsed());
        let mut block = self.stats.lock();
        ProcessorStatistics::from_block(
            &self.config.name,
            self.is_running(),
            uptime,
            &mut block,
            Instant::now(),
        )
    }
}

/// State shared by the loop task and the per-message processing tasks.
struct PollLoop {
    config: Arc<ProcessorConfig>,
    source: Arc<dyn MessageSource>,
    processor: Arc<dyn MessageProcessor>,
    publisher: Arc<dyn MessagePublisher>,
    logger: Arc<dyn MessageLogger>,
    stats: Arc<Mutex<StatsBlock>>,
    cancel: CancellationToken,
    /// Admission gate bounding simultaneously in-flight processing units.
    gate: Arc<Semaphore>,
    started_at: Instant,
}

impl PollLoop {
    /// Run until cancelled. The loop itself never terminates on failure; an
    /// iteration-level error is counted and followed by a back-off.
    async fn run(self: Arc<Self>) {
        info!(
            processor = %self.config.name,
            input_topic = %self.config.input_topic,
            max_concurrency = self.config.max_concurrency,
            interval_secs = self.config.polling_interval_secs,
            "processor loop started"
        );

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let polled = tokio::select! {
                () = self.cancel.cancelled() => break,
                polled = self.source.poll(&self.config.input_topic, POLL_BATCH_SIZE) => polled,
            };

            match polled {
                Ok(batch) => {
                    {
                        let mut stats = self.stats.lock();
                        stats.pending = batch.len() as u64;
                        stats.faulted = false;
                    }
                    if !batch.is_empty() {
                        debug!(
                            processor = %self.config.name,
                            count = batch.len(),
                            "polled batch"
                        );
                        self.process_batch(batch).await;
                        self.log_statistics().await;
                    }
                }
                Err(err) => {
                    error!(
                        processor = %self.config.name,
                        error = %err,
                        "poll iteration failed, backing off"
                    );
                    {
                        let mut stats = self.stats.lock();
                        stats.error_count += 1;
                        stats.faulted = true;
                    }
                    tokio::select! {
                        () = self.cancel.cancelled() => break,
                        () = tokio::time::sleep(LOOP_FAILURE_BACKOFF) => {}
                    }
                    continue;
                }
            }

            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(self.config.polling_interval()) => {}
            }
        }

        info!(processor = %self.config.name, "processor loop exited");
    }

    /// Process one polled batch with parallelism capped by the admission
    /// gate. One message's failure never aborts the batch.
    async fn process_batch(self: &Arc<Self>, batch: Vec<Message>) {
        let mut tasks = JoinSet::new();

        for message in batch {
            let permit = tokio::select! {
                () = self.cancel.cancelled() => break,
                acquired = Arc::clone(&self.gate).acquire_owned() => {
                    match acquired {
                        Ok(permit) => permit,
                        Err(_) => break,
                    }
                }
            };
            let ctx = Arc::clone(self);
            tasks.spawn(async move {
                // Permit released when the task ends, success or failure.
                let _permit = permit;
                ctx.process_one(message).await;
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                if err.is_panic() {
                    self.stats.lock().error_count += 1;
                    error!(
                        processor = %self.config.name,
                        "processing task panicked, message left unacknowledged"
                    );
                }
            }
        }
    }

    /// Handle a single message end to end.
    async fn process_one(&self, mut message: Message) {
        self.logger
            .log_message(&message, MessageStatus::Processing, None)
            .await;

        let outcome = self.processor.process(&message).await;

        if !outcome.success {
            let detail = outcome
                .error_message
                .unwrap_or_else(|| "processor reported failure".to_owned());
            self.stats.lock().error_count += 1;
            warn!(
                processor = %self.config.name,
                message_id = %message.id,
                error = %detail,
                "message processing failed"
            );
            self.logger
                .log_message(&message, MessageStatus::Failed, Some(&detail))
                .await;
            return;
        }

        message.completed_at_ms = Some(now_ms());

        // Full duplication per output topic, not partitioning.
        if !outcome.output_messages.is_empty() {
            for topic in &self.config.output_topics {
                if let Err(err) = self
                    .publisher
                    .publish_batch(outcome.output_messages.clone(), topic)
                    .await
                {
                    let detail = err.to_string();
                    self.stats.lock().error_count += 1;
                    warn!(
                        processor = %self.config.name,
                        message_id = %message.id,
                        topic = %topic,
                        error = %detail,
                        "publish failed, message left unacknowledged"
                    );
                    self.logger
                        .log_message(&message, MessageStatus::Failed, Some(&detail))
                        .await;
                    return;
                }
            }
        }

        if let Err(err) = self.source.acknowledge(message.id).await {
            warn!(
                processor = %self.config.name,
                message_id = %message.id,
                error = %err,
                "acknowledge failed"
            );
        }

        self.stats.lock().record_completion(Instant::now());
        self.logger
            .log_message(&message, MessageStatus::Completed, None)
            .await;
    }

    /// Fire-and-forget statistics snapshot through the logging capability.
    async fn log_statistics(&self) {
        let snapshot = {
            let mut block = self.stats.lock();
            ProcessorStatistics::from_block(
                &self.config.name,
                true,
                self.started_at.elapsed(),
                &mut block,
                Instant::now(),
            )
        };
        self.logger.log_statistics(&snapshot).await;
    }
}

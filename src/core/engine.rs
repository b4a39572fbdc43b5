//! Engine orchestrating processor instances and configuration changes.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigChangeKind, ConfigEvent, ConfigProvider, ProcessorConfig};
use crate::core::capability::{MessageLogger, MessageProcessor, MessagePublisher, MessageSource};
use crate::core::instance::ProcessorInstance;
use crate::core::stats::ProcessorStatistics;
use crate::core::EngineError;

/// Registered-factory lookup from processor-type tag to constructor.
///
/// Resolution happens on start with an explicit unknown-type error; there is
/// no silent fallback to a default implementation.
#[derive(Default)]
pub struct ProcessorRegistry {
    #[allow(clippy::type_complexity)]
    factories: RwLock<
        HashMap<
            String,
            Box<dyn Fn(&ProcessorConfig) -> Result<Arc<dyn MessageProcessor>, EngineError>
                    + Send
                    + Sync>,
        >,
    >,
}

impl ProcessorRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor for a processor-type tag, replacing any prior
    /// registration for the same tag.
    pub fn register<F>(&self, tag: impl Into<String>, factory: F)
    where
        F: Fn(&ProcessorConfig) -> Result<Arc<dyn MessageProcessor>, EngineError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.write().insert(tag.into(), Box::new(factory));
    }

    /// Resolve a configuration's processor-type tag to an implementation.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownProcessorType`] when no factory is
    /// registered for the tag, and whatever the factory itself returns.
    pub fn resolve(
        &self,
        config: &ProcessorConfig,
    ) -> Result<Arc<dyn MessageProcessor>, EngineError> {
        let factories = self.factories.read();
        let factory = factories
            .get(&config.processor_type)
            .ok_or_else(|| EngineError::UnknownProcessorType(config.processor_type.clone()))?;
        factory(config)
    }
}

/// Registry of processor instances keyed by name.
///
/// The engine reacts to API calls and configuration-change events by
/// starting, stopping, and replacing instances, and synthesizes statistics
/// for configured-but-never-started names so every configured processor is
/// observable.
pub struct ProcessorEngine {
    provider: Arc<dyn ConfigProvider>,
    source: Arc<dyn MessageSource>,
    publisher: Arc<dyn MessagePublisher>,
    logger: Arc<dyn MessageLogger>,
    processors: Arc<ProcessorRegistry>,
    instances: RwLock<HashMap<String, Arc<ProcessorInstance>>>,
    /// Per-name locks turning check-then-create-then-register into an
    /// atomic compare-and-install, so racing starts cannot orphan an
    /// instance.
    name_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ProcessorEngine {
    /// Create an engine from its collaborators.
    #[must_use]
    pub fn new(
        provider: Arc<dyn ConfigProvider>,
        source: Arc<dyn MessageSource>,
        publisher: Arc<dyn MessagePublisher>,
        logger: Arc<dyn MessageLogger>,
        processors: Arc<ProcessorRegistry>,
    ) -> Self {
        Self {
            provider,
            source,
            publisher,
            logger,
            processors,
            instances: RwLock::new(HashMap::new()),
            name_locks: Mutex::new(HashMap::new()),
        }
    }

    fn name_lock(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.name_locks.lock();
        Arc::clone(
            locks
                .entry(name.to_owned())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    /// Start the named processor.
    ///
    /// A start on an already-running name is a warned no-op. A prior stopped
    /// entry in the registry is replaced by the new instance.
    ///
    /// # Errors
    ///
    /// [`EngineError::ConfigurationMissing`] when the name is not
    /// configured, [`EngineError::InvalidConfig`] when its configuration
    /// fails validation, and [`EngineError::UnknownProcessorType`] when no
    /// factory matches its type tag.
    pub async fn start(&self, name: &str) -> Result<(), EngineError> {
        let lock = self.name_lock(name);
        let _guard = lock.lock().await;

        let running = self
            .instances
            .read()
            .get(name)
            .is_some_and(|instance| instance.is_running());
        if running {
            warn!(processor = %name, "start requested but processor is already running");
            return Ok(());
        }

        let Some(config) = self.provider.get(name) else {
            error!(processor = %name, "start requested for unconfigured processor");
            return Err(EngineError::ConfigurationMissing(name.to_owned()));
        };
        config.validate().map_err(EngineError::InvalidConfig)?;
        let processor = self.processors.resolve(&config)?;

        let instance = ProcessorInstance::start(
            config,
            Arc::clone(&self.source),
            processor,
            Arc::clone(&self.publisher),
            Arc::clone(&self.logger),
        );
        self.instances.write().insert(name.to_owned(), instance);
        info!(processor = %name, "processor started");
        Ok(())
    }

    /// Stop the named processor, awaiting its loop's completion. A stop on
    /// an absent or already-stopped name is a no-op.
    pub async fn stop(&self, name: &str) {
        let lock = self.name_lock(name);
        let _guard = lock.lock().await;

        let instance = self.instances.read().get(name).cloned();
        if let Some(instance) = instance {
            instance.stop().await;
        } else {
            debug!(processor = %name, "stop requested for unknown processor, ignoring");
        }
    }

    /// Statistics for one name: live when an instance exists, synthesized
    /// "Not Started" when the name is configured but never started, and
    /// "Not Found" otherwise.
    #[must_use]
    pub fn statistics(&self, name: &str) -> ProcessorStatistics {
        if let Some(instance) = self.instances.read().get(name) {
            return instance.statistics();
        }
        if self.provider.get(name).is_some() {
            ProcessorStatistics::not_started(name)
        } else {
            ProcessorStatistics::not_found(name)
        }
    }

    /// Statistics for every configured name, so processors are observable
    /// whether or not they were ever started.
    #[must_use]
    pub fn all_statistics(&self) -> Vec<ProcessorStatistics> {
        let instances = self.instances.read();
        self.provider
            .get_all()
            .into_iter()
            .map(|config| {
                instances.get(&config.name).map_or_else(
                    || ProcessorStatistics::not_started(&config.name),
                    |instance| instance.statistics(),
                )
            })
            .collect()
    }

    /// Names present in the configuration set.
    #[must_use]
    pub fn configured_names(&self) -> Vec<String> {
        self.provider
            .get_all()
            .into_iter()
            .map(|config| config.name)
            .collect()
    }

    /// Whether the named instance's loop is currently active.
    #[must_use]
    pub fn is_running(&self, name: &str) -> bool {
        self.instances
            .read()
            .get(name)
            .is_some_and(|instance| instance.is_running())
    }

    /// Start every configuration with the auto-start flag set. A failure on
    /// one name is logged and never prevents the others from starting.
    pub async fn start_all_auto_start(&self) {
        for config in self.provider.get_all() {
            if !config.auto_start {
                continue;
            }
            if let Err(err) = self.start(&config.name).await {
                error!(processor = %config.name, error = %err, "auto-start failed");
            }
        }
    }

    /// React to one configuration change. Handlers are idempotent under
    /// duplicate delivery of the same event.
    pub async fn handle_config_event(&self, event: ConfigEvent) {
        match event.kind {
            ConfigChangeKind::Added => {
                let auto_start = event.config.as_ref().is_some_and(|c| c.auto_start);
                if auto_start {
                    if let Err(err) = self.start(&event.name).await {
                        error!(processor = %event.name, error = %err, "start on config add failed");
                    }
                }
            }
            ConfigChangeKind::Updated => {
                // Full stop-then-start, never an in-place field patch.
                if self.is_running(&event.name) {
                    self.stop(&event.name).await;
                    if let Err(err) = self.start(&event.name).await {
                        error!(
                            processor = %event.name,
                            error = %err,
                            "restart on config update failed"
                        );
                    }
                }
            }
            ConfigChangeKind::Deleted => {
                self.stop(&event.name).await;
                self.instances.write().remove(&event.name);
                self.name_locks.lock().remove(&event.name);
            }
        }
    }

    /// Consume a stream of configuration change events until cancelled.
    pub async fn run_config_listener(
        self: Arc<Self>,
        mut events: broadcast::Receiver<ConfigEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                () = cancel.cancelled() => break,
                event = events.recv() => event,
            };
            match event {
                Ok(event) => self.handle_config_event(event).await,
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "configuration event stream lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("configuration listener exited");
    }

    /// Spawn the configuration listener on the current runtime and return
    /// the token that cancels it. The subscription is taken before the task
    /// is spawned, so no event emitted after this call returns is missed.
    #[must_use]
    pub fn spawn_config_listener(self: &Arc<Self>) -> CancellationToken {
        let cancel = CancellationToken::new();
        let events = self.provider.subscribe();
        tokio::spawn(Arc::clone(self).run_config_listener(events, cancel.clone()));
        cancel
    }

    /// Stop every running instance, awaiting loop completion for each.
    pub async fn shutdown(&self) {
        let names: Vec<String> = self.instances.read().keys().cloned().collect();
        for name in names {
            self.stop(&name).await;
        }
        info!("engine shut down");
    }
}

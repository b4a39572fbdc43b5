//! Configuration provider contract and the in-memory implementation.
//!
//! The provider owns the mutable configuration set and emits a change event
//! after every mutation. Delivery is at-least-once: subscribers must
//! tolerate duplicate notifications for the same logical change, which the
//! engine's idempotent stop/start handling does.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

use crate::config::processor::{EngineConfig, ProcessorConfig};
use crate::core::EngineError;

/// Kind of configuration change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigChangeKind {
    /// A new name appeared in the configuration set.
    Added,
    /// An existing name's configuration was replaced.
    Updated,
    /// A name was removed from the configuration set.
    Deleted,
}

/// Change event emitted after each configuration mutation.
#[derive(Debug, Clone)]
pub struct ConfigEvent {
    /// Affected processor name.
    pub name: String,
    /// The new configuration, absent for deletions.
    pub config: Option<ProcessorConfig>,
    /// What happened.
    pub kind: ConfigChangeKind,
}

/// Supplier of named processor configurations.
pub trait ConfigProvider: Send + Sync {
    /// Look up one configuration by name.
    fn get(&self, name: &str) -> Option<ProcessorConfig>;

    /// Snapshot of every configuration.
    fn get_all(&self) -> Vec<ProcessorConfig>;

    /// Insert or replace a configuration, emitting `Added` or `Updated`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] when validation fails.
    fn save(&self, config: ProcessorConfig) -> Result<(), EngineError>;

    /// Remove a configuration, emitting `Deleted`. Removing an absent name
    /// is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a backend error when the underlying store fails.
    fn delete(&self, name: &str) -> Result<(), EngineError>;

    /// Force a re-read from the backing store, emitting per-name events for
    /// anything that changed.
    ///
    /// # Errors
    ///
    /// Returns a backend error when the underlying store fails.
    fn reload(&self) -> Result<(), EngineError>;

    /// Register for change events.
    fn subscribe(&self) -> broadcast::Receiver<ConfigEvent>;
}

/// Buffered events kept per subscriber before lagging.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// In-memory configuration provider for embedding and tests.
///
/// There is no backing store, so [`ConfigProvider::reload`] is a no-op;
/// [`InMemoryConfigProvider::replace_all`] plays the role of a file-driven
/// reload by diffing a whole new configuration set against the current one.
pub struct InMemoryConfigProvider {
    configs: RwLock<HashMap<String, ProcessorConfig>>,
    events: broadcast::Sender<ConfigEvent>,
}

impl InMemoryConfigProvider {
    /// Create an empty provider.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            configs: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Create a provider preloaded from an engine configuration. No events
    /// are emitted for the initial set.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] when the set fails validation.
    pub fn with_config(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate().map_err(EngineError::InvalidConfig)?;
        let provider = Self::new();
        {
            let mut configs = provider.configs.write();
            for processor in config.processors {
                configs.insert(processor.name.clone(), processor);
            }
        }
        Ok(provider)
    }

    /// Replace the whole configuration set, emitting `Added`, `Updated`, and
    /// `Deleted` events for the differences. This is the change-event
    /// contract a file watcher would drive.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] when the new set fails
    /// validation; the current set is left untouched.
    pub fn replace_all(&self, config: EngineConfig) -> Result<(), EngineError> {
        config.validate().map_err(EngineError::InvalidConfig)?;

        let mut incoming: HashMap<String, ProcessorConfig> = config
            .processors
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();

        let mut events = Vec::new();
        {
            let mut configs = self.configs.write();
            let existing_names: Vec<String> = configs.keys().cloned().collect();
            for name in existing_names {
                if let Some(replacement) = incoming.remove(&name) {
                    configs.insert(name.clone(), replacement.clone());
                    events.push(ConfigEvent {
                        name,
                        config: Some(replacement),
                        kind: ConfigChangeKind::Updated,
                    });
                } else {
                    configs.remove(&name);
                    events.push(ConfigEvent {
                        name,
                        config: None,
                        kind: ConfigChangeKind::Deleted,
                    });
                }
            }
            for (name, added) in incoming {
                configs.insert(name.clone(), added.clone());
                events.push(ConfigEvent {
                    name,
                    config: Some(added),
                    kind: ConfigChangeKind::Added,
                });
            }
        }

        for event in events {
            self.emit(event);
        }
        Ok(())
    }

    fn emit(&self, event: ConfigEvent) {
        debug!(name = %event.name, kind = ?event.kind, "configuration change");
        // No subscribers is fine; events are best effort.
        let _ = self.events.send(event);
    }
}

impl Default for InMemoryConfigProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigProvider for InMemoryConfigProvider {
    fn get(&self, name: &str) -> Option<ProcessorConfig> {
        self.configs.read().get(name).cloned()
    }

    fn get_all(&self) -> Vec<ProcessorConfig> {
        let mut all: Vec<ProcessorConfig> = self.configs.read().values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    fn save(&self, config: ProcessorConfig) -> Result<(), EngineError> {
        config.validate().map_err(EngineError::InvalidConfig)?;
        let name = config.name.clone();
        let kind = {
            let mut configs = self.configs.write();
            let kind = if configs.contains_key(&name) {
                ConfigChangeKind::Updated
            } else {
                ConfigChangeKind::Added
            };
            configs.insert(name.clone(), config.clone());
            kind
        };
        self.emit(ConfigEvent {
            name,
            config: Some(config),
            kind,
        });
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), EngineError> {
        let removed = self.configs.write().remove(name).is_some();
        if removed {
            self.emit(ConfigEvent {
                name: name.to_owned(),
                config: None,
                kind: ConfigChangeKind::Deleted,
            });
        }
        Ok(())
    }

    fn reload(&self) -> Result<(), EngineError> {
        // Nothing to re-read; the in-memory set is authoritative.
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ConfigEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str) -> ProcessorConfig {
        ProcessorConfig {
            name: name.into(),
            input_topic: "in".into(),
            output_topics: vec![],
            processor_type: "echo".into(),
            max_concurrency: 1,
            polling_interval_secs: 1,
            auto_start: false,
            custom_settings: HashMap::new(),
        }
    }

    #[test]
    fn test_save_emits_added_then_updated() {
        let provider = InMemoryConfigProvider::new();
        let mut rx = provider.subscribe();

        provider.save(config("p1")).unwrap();
        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, ConfigChangeKind::Added);
        assert!(event.config.is_some());

        provider.save(config("p1")).unwrap();
        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, ConfigChangeKind::Updated);
    }

    #[test]
    fn test_delete_emits_once() {
        let provider = InMemoryConfigProvider::new();
        provider.save(config("p1")).unwrap();
        let mut rx = provider.subscribe();

        provider.delete("p1").unwrap();
        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, ConfigChangeKind::Deleted);
        assert!(event.config.is_none());

        // Deleting an absent name emits nothing.
        provider.delete("p1").unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_save_rejects_invalid() {
        let provider = InMemoryConfigProvider::new();
        let mut bad = config("p1");
        bad.max_concurrency = 0;
        assert!(provider.save(bad).is_err());
        assert!(provider.get("p1").is_none());
    }

    #[test]
    fn test_replace_all_diffs() {
        let provider = InMemoryConfigProvider::with_config(EngineConfig {
            processors: vec![config("keep"), config("drop")],
        })
        .unwrap();
        let mut rx = provider.subscribe();

        provider
            .replace_all(EngineConfig {
                processors: vec![config("keep"), config("new")],
            })
            .unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push((event.name, event.kind));
        }
        kinds.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            kinds,
            vec![
                ("drop".to_owned(), ConfigChangeKind::Deleted),
                ("keep".to_owned(), ConfigChangeKind::Updated),
                ("new".to_owned(), ConfigChangeKind::Added),
            ]
        );
        assert!(provider.get("drop").is_none());
        assert!(provider.get("new").is_some());
    }

    #[test]
    fn test_get_all_sorted() {
        let provider = InMemoryConfigProvider::new();
        provider.save(config("b")).unwrap();
        provider.save(config("a")).unwrap();
        let names: Vec<_> = provider.get_all().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}

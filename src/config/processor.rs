//! Processor configuration records and validation.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for one named processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Unique processor name, the registry key.
    pub name: String,
    /// Topic polled for pending messages.
    pub input_topic: String,
    /// Ordered topics every emitted message is broadcast to.
    #[serde(default)]
    pub output_topics: Vec<String>,
    /// Tag resolved to a processor implementation through the factory
    /// registry.
    pub processor_type: String,
    /// Upper bound on simultaneously in-flight processing units.
    pub max_concurrency: usize,
    /// Delay between poll cycles, in seconds.
    pub polling_interval_secs: u64,
    /// Start this processor when the engine initializes.
    #[serde(default)]
    pub auto_start: bool,
    /// Arbitrary typed settings passed through to the processor factory.
    #[serde(default)]
    pub custom_settings: HashMap<String, serde_json::Value>,
}

impl ProcessorConfig {
    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated constraint.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".into());
        }
        if self.input_topic.trim().is_empty() {
            return Err("input_topic must not be empty".into());
        }
        if self.processor_type.trim().is_empty() {
            return Err("processor_type must not be empty".into());
        }
        if self.max_concurrency == 0 {
            return Err("max_concurrency must be at least 1".into());
        }
        if self.polling_interval_secs == 0 {
            return Err("polling_interval_secs must be at least 1".into());
        }
        Ok(())
    }

    /// Polling interval as a duration.
    #[must_use]
    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval_secs)
    }
}

/// Root configuration: the full set of processor configurations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Configured processors.
    pub processors: Vec<ProcessorConfig>,
}

impl EngineConfig {
    /// Validate all processors and enforce name uniqueness.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated constraint.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for processor in &self.processors {
            processor
                .validate()
                .map_err(|e| format!("processor `{}` invalid: {e}", processor.name))?;
            if !seen.insert(processor.name.as_str()) {
                return Err(format!("duplicate processor name `{}`", processor.name));
            }
        }
        Ok(())
    }

    /// Parse an engine configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: EngineConfig =
            serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ProcessorConfig {
        ProcessorConfig {
            name: "orders".into(),
            input_topic: "orders-in".into(),
            output_topics: vec!["orders-out".into()],
            processor_type: "echo".into(),
            max_concurrency: 4,
            polling_interval_secs: 5,
            auto_start: true,
            custom_settings: HashMap::new(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut cfg = valid();
        cfg.max_concurrency = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut cfg = valid();
        cfg.polling_interval_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut cfg = valid();
        cfg.name = "  ".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let cfg = EngineConfig {
            processors: vec![valid(), valid()],
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.contains("duplicate"));
    }

    #[test]
    fn test_from_json_str() {
        let cfg = EngineConfig::from_json_str(
            r#"{
                "processors": [{
                    "name": "p1",
                    "input_topic": "t",
                    "output_topics": ["o"],
                    "processor_type": "echo",
                    "max_concurrency": 2,
                    "polling_interval_secs": 1,
                    "auto_start": true,
                    "custom_settings": {"region": "eu"}
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.processors.len(), 1);
        assert_eq!(cfg.processors[0].custom_settings["region"], "eu");
    }

    #[test]
    fn test_from_json_str_rejects_invalid() {
        let result = EngineConfig::from_json_str(
            r#"{
                "processors": [{
                    "name": "p1",
                    "input_topic": "t",
                    "processor_type": "echo",
                    "max_concurrency": 0,
                    "polling_interval_secs": 1
                }]
            }"#,
        );
        assert!(result.is_err());
    }
}

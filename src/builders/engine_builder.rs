//! Builder assembling a processor engine from its collaborators.

use std::sync::Arc;

use crate::config::ConfigProvider;
use crate::core::capability::{MessageLogger, MessagePublisher, MessageSource};
use crate::core::engine::{ProcessorEngine, ProcessorRegistry};
use crate::core::EngineError;
use crate::infra::logger::TracingMessageLogger;
use crate::infra::publisher::FanOutPublisher;

/// Builder for [`ProcessorEngine`].
///
/// Provider and source are required; the publisher defaults to an empty
/// [`FanOutPublisher`] and the logger to [`TracingMessageLogger`].
#[derive(Default)]
pub struct EngineBuilder {
    provider: Option<Arc<dyn ConfigProvider>>,
    source: Option<Arc<dyn MessageSource>>,
    publisher: Option<Arc<dyn MessagePublisher>>,
    logger: Option<Arc<dyn MessageLogger>>,
    processors: Option<Arc<ProcessorRegistry>>,
}

impl EngineBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration provider.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn ConfigProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the message source.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn MessageSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the publisher.
    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn MessagePublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Set the logger.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn MessageLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Set the processor factory registry.
    #[must_use]
    pub fn with_processors(mut self, processors: Arc<ProcessorRegistry>) -> Self {
        self.processors = Some(processors);
        self
    }

    /// Assemble the engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] when a required collaborator
    /// is missing.
    pub fn build(self) -> Result<Arc<ProcessorEngine>, EngineError> {
        let provider = self
            .provider
            .ok_or_else(|| EngineError::InvalidConfig("a configuration provider is required".into()))?;
        let source = self
            .source
            .ok_or_else(|| EngineError::InvalidConfig("a message source is required".into()))?;
        let publisher = self
            .publisher
            .unwrap_or_else(|| Arc::new(FanOutPublisher::new()));
        let logger = self
            .logger
            .unwrap_or_else(|| Arc::new(TracingMessageLogger));
        let processors = self.processors.unwrap_or_default();

        Ok(Arc::new(ProcessorEngine::new(
            provider, source, publisher, logger, processors,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InMemoryConfigProvider;
    use crate::infra::source::InMemorySource;

    #[tokio::test]
    async fn test_build_requires_provider_and_source() {
        assert!(EngineBuilder::new().build().is_err());
        assert!(EngineBuilder::new()
            .with_provider(Arc::new(InMemoryConfigProvider::new()))
            .build()
            .is_err());
        assert!(EngineBuilder::new()
            .with_provider(Arc::new(InMemoryConfigProvider::new()))
            .with_source(Arc::new(InMemorySource::new()))
            .build()
            .is_ok());
    }
}

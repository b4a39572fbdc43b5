//! Configuration models and the provider contract.

pub mod processor;
pub mod provider;

pub use processor::{EngineConfig, ProcessorConfig};
pub use provider::{
    ConfigChangeKind, ConfigEvent, ConfigProvider, InMemoryConfigProvider,
};

//! Engine core: message model, capability contracts, instances, and the
//! engine registry.

pub mod capability;
pub mod engine;
pub mod error;
pub mod instance;
pub mod message;
pub mod stats;

pub use capability::{
    MessageLogger, MessageProcessor, MessagePublisher, MessageSink, MessageSource,
};
pub use engine::{ProcessorEngine, ProcessorRegistry};
pub use error::{AppResult, EngineError};
pub use instance::ProcessorInstance;
pub use message::{Message, MessageStatus, ProcessingOutcome};
pub use stats::{ProcessorStatistics, ProcessorStatus};

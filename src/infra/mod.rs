//! Infrastructure adapters for sources, sinks, and loggers.

pub mod logger;
pub mod publisher;
pub mod source;

pub use logger::{BackgroundMessageLogger, InMemoryMessageLogger, TracingMessageLogger};
pub use publisher::{FanOutPublisher, InMemorySink, SourceSink};
pub use source::{FileSource, HttpSource, InMemorySource, PostgresSource};

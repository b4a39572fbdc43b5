//! # Conveyor
//!
//! A message-processing engine that manages the lifecycle of named workers,
//! polls pluggable message sources on a schedule, bounds per-worker
//! concurrency, aggregates live statistics under concurrent access, and
//! reacts to hot configuration changes.
//!
//! ## Core Model
//!
//! Each configured processor name gets at most one [`core::ProcessorInstance`]:
//! an independent, cooperatively-cancellable polling loop. Per iteration the
//! loop polls its input topic for a batch of pending messages, processes the
//! batch with parallelism capped by an admission gate, broadcasts emitted
//! messages to every configured output topic, and acknowledges the originals.
//! A failed message is counted and left unacknowledged; redelivery belongs to
//! the source.
//!
//! The [`core::ProcessorEngine`] owns the name-to-instance registry. It
//! starts and stops instances in response to API calls and to
//! configuration-change events, and synthesizes "Not Started" statistics for
//! configured processors that were never started, so every configured name is
//! observable.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use conveyor::builders::EngineBuilder;
//! use conveyor::config::InMemoryConfigProvider;
//! use conveyor::core::ProcessorRegistry;
//! use conveyor::infra::{FanOutPublisher, InMemorySource};
//!
//! let provider = Arc::new(InMemoryConfigProvider::new());
//! let source = Arc::new(InMemorySource::new());
//! let processors = Arc::new(ProcessorRegistry::new());
//! processors.register("echo", |_cfg| Ok(Arc::new(MyProcessor)));
//!
//! let engine = EngineBuilder::new()
//!     .with_provider(provider)
//!     .with_source(source)
//!     .with_processors(processors)
//!     .build()?;
//!
//! engine.start_all_auto_start().await;
//! let cancel = engine.spawn_config_listener();
//! ```
//!
//! Nothing in the engine is fatal to the process: the worst observable
//! outcome is a stuck or error-accumulating instance, recoverable by an
//! explicit stop and start.

#![deny(missing_docs)]
#![warn(clippy::all)]

/// Engine core: message model, capabilities, instances, and the registry.
pub mod core;
/// Configuration models and the provider contract.
pub mod config;
/// Builders to construct engine components.
pub mod builders;
/// Infrastructure adapters for sources, sinks, and loggers.
pub mod infra;
/// Shared utilities.
pub mod util;

//! Builders to construct engine components from configuration.

pub mod engine_builder;

pub use engine_builder::EngineBuilder;

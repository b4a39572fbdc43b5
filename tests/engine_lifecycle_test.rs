//! Integration tests for engine start/stop semantics and status reporting.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use conveyor::builders::EngineBuilder;
use conveyor::config::{ConfigProvider, InMemoryConfigProvider, ProcessorConfig};
use conveyor::core::{
    EngineError, Message, MessageProcessor, ProcessingOutcome, ProcessorEngine, ProcessorRegistry,
    ProcessorStatus,
};
use conveyor::infra::InMemorySource;

fn processor_config(name: &str, processor_type: &str, auto_start: bool) -> ProcessorConfig {
    ProcessorConfig {
        name: name.into(),
        input_topic: "t".into(),
        output_topics: Vec::new(),
        processor_type: processor_type.into(),
        max_concurrency: 1,
        polling_interval_secs: 1,
        auto_start,
        custom_settings: HashMap::new(),
    }
}

struct NoopProcessor;

#[async_trait]
impl MessageProcessor for NoopProcessor {
    async fn process(&self, _message: &Message) -> ProcessingOutcome {
        ProcessingOutcome::ok()
    }
}

struct Fixture {
    engine: Arc<ProcessorEngine>,
    provider: Arc<InMemoryConfigProvider>,
    source: Arc<InMemorySource>,
}

fn build_engine(configs: Vec<ProcessorConfig>) -> Fixture {
    let provider = Arc::new(InMemoryConfigProvider::new());
    for config in configs {
        provider.save(config).unwrap();
    }
    let source = Arc::new(InMemorySource::new());

    let processors = Arc::new(ProcessorRegistry::new());
    processors.register("noop", |_cfg| Ok(Arc::new(NoopProcessor)));

    let engine = EngineBuilder::new()
        .with_provider(Arc::clone(&provider) as _)
        .with_source(Arc::clone(&source) as _)
        .with_processors(processors)
        .build()
        .unwrap();

    Fixture {
        engine,
        provider,
        source,
    }
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("condition not reached within timeout");
}

#[tokio::test]
async fn test_configured_but_never_started_reports_not_started() {
    let fixture = build_engine(vec![processor_config("P", "noop", false)]);

    let stats = fixture.engine.statistics("P");
    assert_eq!(stats.status, ProcessorStatus::NotStarted);
    assert!(!stats.is_running);
    assert_eq!(stats.total_processed, 0);
    assert_eq!(stats.uptime, Duration::ZERO);

    // Every configured name shows up in the aggregate view.
    let all = fixture.engine.all_statistics();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].name, "P");
    assert_eq!(all[0].status, ProcessorStatus::NotStarted);
}

#[tokio::test]
async fn test_unknown_name_reports_not_found() {
    let fixture = build_engine(vec![]);
    let stats = fixture.engine.statistics("ghost");
    assert_eq!(stats.status, ProcessorStatus::NotFound);
}

#[tokio::test]
async fn test_start_without_configuration_fails() {
    let fixture = build_engine(vec![]);
    let result = fixture.engine.start("ghost").await;
    assert!(matches!(result, Err(EngineError::ConfigurationMissing(_))));
}

#[tokio::test]
async fn test_start_with_unregistered_type_fails() {
    let fixture = build_engine(vec![processor_config("P", "no-such-type", false)]);
    let result = fixture.engine.start("P").await;
    assert!(matches!(
        result,
        Err(EngineError::UnknownProcessorType(tag)) if tag == "no-such-type"
    ));
    assert!(!fixture.engine.is_running("P"));
}

#[tokio::test]
async fn test_double_start_is_a_noop() {
    let fixture = build_engine(vec![processor_config("P", "noop", false)]);
    fixture
        .source
        .push("t", Message::new("t", serde_json::json!({})));

    fixture.engine.start("P").await.unwrap();
    let engine = Arc::clone(&fixture.engine);
    wait_for(move || engine.statistics("P").total_processed == 1).await;

    let before = fixture.engine.statistics("P");
    fixture.engine.start("P").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let after = fixture.engine.statistics("P");
    assert!(after.is_running);
    assert_eq!(after.total_processed, before.total_processed);
    // The original instance survived, so its uptime keeps growing.
    assert!(after.uptime >= before.uptime);

    fixture.engine.stop("P").await;
}

#[tokio::test]
async fn test_stop_quiesces_the_instance() {
    let fixture = build_engine(vec![processor_config("P", "noop", false)]);
    fixture
        .source
        .push("t", Message::new("t", serde_json::json!({})));

    fixture.engine.start("P").await.unwrap();
    let engine = Arc::clone(&fixture.engine);
    wait_for(move || engine.statistics("P").total_processed == 1).await;

    fixture.engine.stop("P").await;

    let stats = fixture.engine.statistics("P");
    assert!(!stats.is_running);
    assert_eq!(stats.status, ProcessorStatus::Stopped);
    let frozen_uptime = stats.uptime;

    // No processing after stop returns, even with work available.
    fixture
        .source
        .push("t", Message::new("t", serde_json::json!({})));
    tokio::time::sleep(Duration::from_millis(1300)).await;

    let later = fixture.engine.statistics("P");
    assert_eq!(later.total_processed, 1);
    assert_eq!(later.uptime, frozen_uptime);
    assert_eq!(fixture.source.depth("t"), 1);
}

#[tokio::test]
async fn test_stop_on_unknown_name_is_a_noop() {
    let fixture = build_engine(vec![]);
    fixture.engine.stop("ghost").await;
}

#[tokio::test]
async fn test_restart_after_stop_creates_a_fresh_instance() {
    let fixture = build_engine(vec![processor_config("P", "noop", false)]);
    fixture
        .source
        .push("t", Message::new("t", serde_json::json!({})));

    fixture.engine.start("P").await.unwrap();
    let engine = Arc::clone(&fixture.engine);
    wait_for(move || engine.statistics("P").total_processed == 1).await;
    fixture.engine.stop("P").await;

    fixture.engine.start("P").await.unwrap();
    let stats = fixture.engine.statistics("P");
    assert!(stats.is_running);
    // Counters restart from zero with the new instance.
    assert_eq!(stats.total_processed, 0);

    fixture.engine.stop("P").await;
}

#[tokio::test]
async fn test_auto_start_starts_flagged_processors_only() {
    let fixture = build_engine(vec![
        processor_config("auto", "noop", true),
        processor_config("manual", "noop", false),
    ]);

    fixture.engine.start_all_auto_start().await;

    assert!(fixture.engine.is_running("auto"));
    assert!(!fixture.engine.is_running("manual"));

    fixture.engine.shutdown().await;
}

#[tokio::test]
async fn test_auto_start_failure_does_not_block_others() {
    let fixture = build_engine(vec![
        processor_config("broken", "no-such-type", true),
        processor_config("working", "noop", true),
    ]);

    fixture.engine.start_all_auto_start().await;

    assert!(!fixture.engine.is_running("broken"));
    assert!(fixture.engine.is_running("working"));

    fixture.engine.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_every_instance() {
    let fixture = build_engine(vec![
        processor_config("a", "noop", true),
        processor_config("b", "noop", true),
    ]);
    fixture.engine.start_all_auto_start().await;
    assert!(fixture.engine.is_running("a"));
    assert!(fixture.engine.is_running("b"));

    fixture.engine.shutdown().await;

    assert!(!fixture.engine.is_running("a"));
    assert!(!fixture.engine.is_running("b"));
}

#[tokio::test]
async fn test_configured_names_lists_provider_contents() {
    let fixture = build_engine(vec![
        processor_config("a", "noop", false),
        processor_config("b", "noop", false),
    ]);
    let names = fixture.engine.configured_names();
    assert_eq!(names, vec!["a".to_owned(), "b".to_owned()]);
    // Provider is shared state, reflected immediately.
    fixture.provider.delete("a").unwrap();
    assert_eq!(fixture.engine.configured_names(), vec!["b".to_owned()]);
}

//! Postgres-backed message source (schema and interface stubs).

use async_trait::async_trait;
use uuid::Uuid;

use crate::core::capability::MessageSource;
use crate::core::message::Message;
use crate::core::EngineError;

/// Postgres source adapter placeholder.
pub struct PostgresSource;

impl PostgresSource {
    /// Create a new adapter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Migration statements for the relational message store. Polling uses
    /// `FOR UPDATE SKIP LOCKED` so concurrent engine processes never claim
    /// the same message twice.
    #[must_use]
    pub fn migrations() -> &'static [&'static str] {
        &[
            r#"
CREATE TABLE IF NOT EXISTS cv_messages (
    id UUID PRIMARY KEY,
    topic TEXT NOT NULL,
    payload JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    received_at TIMESTAMPTZ,
    completed_at TIMESTAMPTZ,
    acknowledged BOOLEAN NOT NULL DEFAULT FALSE
);
CREATE INDEX IF NOT EXISTS idx_cv_messages_topic_pending
    ON cv_messages (topic, created_at) WHERE NOT acknowledged;
"#,
        ]
    }
}

impl Default for PostgresSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageSource for PostgresSource {
    async fn poll(&self, _topic: &str, _max: usize) -> Result<Vec<Message>, EngineError> {
        Err(EngineError::Backend(
            "postgres source not wired to database client".into(),
        ))
    }

    async fn acknowledge(&self, _id: Uuid) -> Result<(), EngineError> {
        Err(EngineError::Backend(
            "postgres source not wired to database client".into(),
        ))
    }

    async fn healthy(&self) -> bool {
        false
    }
}

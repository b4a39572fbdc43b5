//! Remote HTTP queue source.
//!
//! Expects a small REST surface on the remote queue:
//! `GET {base}/topics/{topic}/messages?limit={n}` returning a JSON array of
//! pending messages, `POST {base}/messages/{id}/ack`, and `GET {base}/health`.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use crate::core::capability::MessageSource;
use crate::core::message::Message;
use crate::core::EngineError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Message source backed by a remote HTTP queue service.
pub struct HttpSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSource {
    /// Create a source for the queue service at `base_url` (no trailing
    /// slash).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Source`] when the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EngineError::Source(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }
}

#[async_trait]
impl MessageSource for HttpSource {
    async fn poll(&self, topic: &str, max: usize) -> Result<Vec<Message>, EngineError> {
        let url = format!("{}/topics/{topic}/messages", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("limit", max)])
            .send()
            .await
            .map_err(|e| EngineError::Source(e.to_string()))?
            .error_for_status()
            .map_err(|e| EngineError::Source(e.to_string()))?;
        response
            .json::<Vec<Message>>()
            .await
            .map_err(|e| EngineError::Source(e.to_string()))
    }

    async fn acknowledge(&self, id: Uuid) -> Result<(), EngineError> {
        let url = format!("{}/messages/{id}/ack", self.base_url);
        // Best effort: a failed acknowledgement only means redelivery.
        let result = self.client.post(&url).send().await;
        match result.and_then(reqwest::Response::error_for_status) {
            Ok(_) => {}
            Err(err) => {
                warn!(message_id = %id, error = %err, "acknowledge request failed");
            }
        }
        Ok(())
    }

    async fn healthy(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    clients::{ChatClient, circuit_breaker::CircuitBreaker},
    error::{ProviderErrorKind, WorkerError},
};

const PROVIDER: &str = "chat";

#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    text: &'a str,
}

/// Posts operational reports into the team chat room.
pub struct ChatWebhookClient {
    http_client: Client,
    webhook_url: String,
    circuit_breaker: Option<CircuitBreaker>,
}

impl ChatWebhookClient {
    pub fn new(webhook_url: &str, timeout: Duration) -> Result<Self, WorkerError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WorkerError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        info!("Chat webhook client initialized");

        Ok(Self {
            http_client,
            webhook_url: webhook_url.to_string(),
            circuit_breaker: None,
        })
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: CircuitBreaker) -> Self {
        self.circuit_breaker = Some(circuit_breaker);
        self
    }

    async fn post(&self, text: &str) -> Result<(), WorkerError> {
        let response = self
            .http_client
            .post(&self.webhook_url)
            .json(&WebhookMessage { text })
            .send()
            .await
            .map_err(|e| WorkerError::from_reqwest(PROVIDER, e))?;

        let status = response.status();

        if status.is_success() {
            debug!("Chat message posted");
            Ok(())
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(WorkerError::provider(
                PROVIDER,
                ProviderErrorKind::from_status(status),
                format!("status {}: {}", status, error_text),
            ))
        }
    }
}

#[async_trait]
impl ChatClient for ChatWebhookClient {
    async fn push_message(&self, text: &str) -> Result<(), WorkerError> {
        match &self.circuit_breaker {
            Some(circuit_breaker) => circuit_breaker.call(|| self.post(text)).await,
            None => self.post(text).await,
        }
    }
}

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use crate::{
    clients::{MailClient, circuit_breaker::CircuitBreaker},
    error::{ProviderErrorKind, WorkerError},
    models::{
        mail::{MailAddress, MailPersonalization, MailRequest},
        recipient::Personalization,
    },
};

const PROVIDER: &str = "mail";

/// Templated transactional mail over the provider's v3 send API.
pub struct MailApiClient {
    http_client: Client,
    base_url: String,
    api_key: String,
    from: MailAddress,
    circuit_breaker: Option<CircuitBreaker>,
}

impl MailApiClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        from_address: &str,
        from_name: &str,
        timeout: Duration,
    ) -> Result<Self, WorkerError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WorkerError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        info!(base_url, "Mail client initialized");

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            from: MailAddress {
                email: from_address.to_string(),
                name: from_name.to_string(),
            },
            circuit_breaker: None,
        })
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: CircuitBreaker) -> Self {
        self.circuit_breaker = Some(circuit_breaker);
        self
    }

    async fn send_once(&self, request: &MailRequest) -> Result<(), WorkerError> {
        let url = format!("{}/v3/mail/send", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| WorkerError::from_reqwest(PROVIDER, e))?;

        let status = response.status();

        if status.is_success() {
            info!(
                template_id = %request.template_id,
                recipients = request.personalizations.len(),
                "Mail sent successfully"
            );
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
impl MailClient for MailApiClient {
    async fn send_multiple(
        &self,
        email_id: &str,
        personalizations: &[Personalization],
    ) -> Result<(), WorkerError> {
        debug!(
            email_id,
            recipients = personalizations.len(),
            "Sending templated mail"
        );

        let request = MailRequest {
            from: self.from.clone(),
            template_id: email_id.to_string(),
            personalizations: personalizations
                .iter()
                .map(MailPersonalization::from)
                .collect(),
        };

        match &self.circuit_breaker {
            Some(circuit_breaker) => circuit_breaker.call(|| self.send_once(&request)).await,
            None => self.send_once(&request).await,
        }
    }
}

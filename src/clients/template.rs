use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::{
    clients::TemplateStore,
    error::{ProviderErrorKind, WorkerError},
    models::{
        response::ApiResponse,
        template::{MessageTemplate, PushTemplate, ReportTemplate},
    },
};

const PROVIDER: &str = "template_service";

/// Reads stored templates from the template service.
pub struct TemplateServiceClient {
    http_client: Client,
    base_url: String,
}

impl TemplateServiceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, WorkerError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WorkerError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        info!(base_url, "Template service client initialized");

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_template<T: DeserializeOwned>(
        &self,
        kind: &str,
        template_id: &str,
    ) -> Result<T, WorkerError> {
        let url = format!("{}/api/v1/templates/{}/{}", self.base_url, kind, template_id);

        debug!(kind, template_id, "Fetching template from service");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| WorkerError::from_reqwest(PROVIDER, e))?;

        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(WorkerError::NotFound(format!(
                "{} template {}",
                kind, template_id
            )));
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(WorkerError::provider(
                PROVIDER,
                ProviderErrorKind::from_status(status),
                format!("Template service returned status {}: {}", status, error_text),
            ));
        }

        let envelope: ApiResponse<T> = response.json().await.map_err(|e| {
            WorkerError::provider(
                PROVIDER,
                ProviderErrorKind::Internal,
                format!("Failed to parse template JSON: {}", e),
            )
        })?;

        envelope.into_data().map_err(|message| {
            WorkerError::NotFound(format!("{} template {}: {}", kind, template_id, message))
        })
    }
}

#[async_trait]
impl TemplateStore for TemplateServiceClient {
    async fn push_template(&self, id: &str) -> Result<PushTemplate, WorkerError> {
        self.fetch_template("push", id).await
    }

    async fn message_template(&self, id: &str) -> Result<MessageTemplate, WorkerError> {
        self.fetch_template("message", id).await
    }

    async fn report_template(&self, id: &str) -> Result<ReportTemplate, WorkerError> {
        self.fetch_template("report", id).await
    }
}

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures_util::future::join_all;
use gcp_auth::TokenProvider;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::{
    clients::{PushClient, circuit_breaker::CircuitBreaker},
    error::{ProviderErrorKind, WorkerError},
    models::push::{
        FcmErrorResponse, FcmMessage, FcmNotification, FcmRequest, MulticastMessage,
        MulticastResponse,
    },
};

const PROVIDER: &str = "fcm";
const SCOPES: &[&str] = &["https://www.googleapis.com/auth/firebase.messaging"];

/// FCM HTTP v1 client. A multicast is one request per device token.
pub struct FcmClient {
    http_client: Client,
    base_url: String,
    fcm_project_id: String,
    token_provider: Arc<dyn TokenProvider>,
    circuit_breaker: Option<CircuitBreaker>,
}

impl FcmClient {
    pub async fn new(fcm_project_id: &str, timeout: Duration) -> Result<Self, WorkerError> {
        let token_provider = gcp_auth::provider().await.map_err(|e| {
            WorkerError::provider(PROVIDER, ProviderErrorKind::Unauthenticated, e.to_string())
        })?;

        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WorkerError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        info!(project_id = fcm_project_id, "FCM client initialized");

        Ok(Self {
            http_client,
            base_url: "https://fcm.googleapis.com".to_string(),
            fcm_project_id: fcm_project_id.to_string(),
            token_provider,
            circuit_breaker: None,
        })
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: CircuitBreaker) -> Self {
        self.circuit_breaker = Some(circuit_breaker);
        self
    }

    async fn multicast(
        &self,
        message: &MulticastMessage,
    ) -> Result<MulticastResponse, WorkerError> {
        let access_token = self.token_provider.token(SCOPES).await.map_err(|e| {
            WorkerError::provider(PROVIDER, ProviderErrorKind::Unavailable, e.to_string())
        })?;

        let results = join_all(
            message
                .tokens
                .iter()
                .map(|token| self.send_one(access_token.as_str(), token, message)),
        )
        .await;

        for result in &results {
            if let Err(e) = result {
                warn!(error = %e, "FCM send failed for one device");
            }
        }

        let response = MulticastResponse::collect(message.tokens.iter().cloned().zip(results))?;

        info!(
            success_count = response.success_count,
            failure_count = response.failure_count,
            "FCM multicast finished"
        );

        Ok(response)
    }

    async fn send_one(
        &self,
        access_token: &str,
        device_token: &str,
        message: &MulticastMessage,
    ) -> Result<(), WorkerError> {
        let request = FcmRequest {
            message: FcmMessage {
                token: device_token.to_string(),
                notification: FcmNotification {
                    title: message.title.clone(),
                    body: message.body.clone(),
                    image: message.image_url.clone(),
                },
                data: message.data.clone(),
            },
        };

        let url = format!(
            "{}/v1/projects/{}/messages:send",
            self.base_url, self.fcm_project_id
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| WorkerError::from_reqwest(PROVIDER, e))?;

        let status = response.status();

        if status.is_success() {
            debug!("FCM push notification sent successfully");
            return Ok(());
        }

        let error_text = response.text().await.unwrap_or_default();
        let kind = match serde_json::from_str::<FcmErrorResponse>(&error_text) {
            Ok(parsed) => match ProviderErrorKind::from_fcm_code(parsed.error.code()) {
                ProviderErrorKind::Unknown => ProviderErrorKind::from_status(status),
                kind => kind,
            },
            Err(_) => ProviderErrorKind::from_status(status),
        };

        Err(WorkerError::provider(
            PROVIDER,
            kind,
            format!("FCM request failed: {}", error_text),
        ))
    }
}

#[async_trait]
impl PushClient for FcmClient {
    async fn send_multicast(
        &self,
        message: &MulticastMessage,
    ) -> Result<MulticastResponse, WorkerError> {
        debug!(tokens = message.tokens.len(), "Sending FCM multicast");

        match &self.circuit_breaker {
            Some(circuit_breaker) => circuit_breaker.call(|| self.multicast(message)).await,
            None => self.multicast(message).await,
        }
    }
}

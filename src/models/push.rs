use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{WorkerError, is_retryable};

/// One notification addressed to many device tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MulticastMessage {
    pub tokens: Vec<String>,
    pub title: String,
    pub body: String,
    pub image_url: Option<String>,
    pub data: HashMap<String, String>,
}

/// Outcome of a multicast; individual token failures are not a send error.
#[derive(Debug, Default)]
pub struct MulticastResponse {
    pub success_count: usize,
    pub failure_count: usize,
    pub failures: Vec<(String, WorkerError)>,
}

impl MulticastResponse {
    /// Folds per-token results into one response.
    ///
    /// The multicast only fails as a whole when no token succeeded and every
    /// failure is transient, so the send can be retried.
    pub fn collect<I>(results: I) -> Result<Self, WorkerError>
    where
        I: IntoIterator<Item = (String, Result<(), WorkerError>)>,
    {
        let mut response = Self::default();

        for (token, result) in results {
            match result {
                Ok(()) => response.success_count += 1,
                Err(e) => {
                    response.failure_count += 1;
                    response.failures.push((token, e));
                }
            }
        }

        if response.success_count == 0
            && !response.failures.is_empty()
            && response.failures.iter().all(|(_, e)| is_retryable(e))
        {
            let (_, first) = response.failures.swap_remove(0);
            return Err(first);
        }

        Ok(response)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FcmRequest {
    pub message: FcmMessage,
}

#[derive(Debug, Clone, Serialize)]
pub struct FcmMessage {
    pub token: String,
    pub notification: FcmNotification,

    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FcmNotification {
    pub title: String,
    pub body: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FcmErrorResponse {
    pub error: FcmErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FcmErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub details: Vec<FcmErrorDetail>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FcmErrorDetail {
    #[serde(default)]
    pub error_code: Option<String>,
}

impl FcmErrorBody {
    /// The FCM-specific code when present, otherwise the RPC status.
    pub fn code(&self) -> &str {
        self.details
            .iter()
            .find_map(|d| d.error_code.as_deref())
            .unwrap_or(&self.status)
    }
}

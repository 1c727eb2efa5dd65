//! Batch worker: fans queue records out to the dispatcher with bounded
//! concurrency and decides which failed records the queue should redeliver.

pub mod dispatcher;
pub mod mail;
pub mod message;
pub mod push;
pub mod report;

use std::{collections::BTreeSet, sync::Arc};

use chrono::{SecondsFormat, Utc};
use tokio::{sync::Semaphore, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    clients::{
        ChatClient, DeadLetterSink, IdempotencyStore, MailClient, MessageStore, PushClient,
        RecipientDirectory, TemplateStore,
    },
    error::{BatchError, RecordFailure, WorkerError, is_retryable},
    models::{
        message::{DlqMessage, QueueRecord},
        retry::RetryConfig,
    },
};

#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Records dispatched at the same time within one batch.
    pub concurrency: usize,
    pub retry: RetryConfig,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            retry: RetryConfig::default(),
        }
    }
}

/// Everything the worker talks to, injected once at construction.
#[derive(Clone)]
pub struct Dependencies {
    pub idempotency: Arc<dyn IdempotencyStore>,
    pub directory: Arc<dyn RecipientDirectory>,
    pub templates: Arc<dyn TemplateStore>,
    pub messages: Arc<dyn MessageStore>,
    pub mailer: Arc<dyn MailClient>,
    pub push: Arc<dyn PushClient>,
    pub chat: Arc<dyn ChatClient>,
    pub dead_letters: Option<Arc<dyn DeadLetterSink>>,
}

#[derive(Clone)]
pub struct Worker {
    deps: Dependencies,
    options: WorkerOptions,
}

impl Worker {
    pub fn new(deps: Dependencies, options: WorkerOptions) -> Self {
        Self { deps, options }
    }

    pub fn options(&self) -> &WorkerOptions {
        &self.options
    }

    pub async fn dispatch(
        &self,
        token: &CancellationToken,
        record: &QueueRecord,
    ) -> Result<(), WorkerError> {
        dispatcher::dispatch(&self.deps, &self.options.retry, token, &record.body).await
    }

    /// Dispatches every record of a batch.
    ///
    /// Non-retryable record errors are logged, dead-lettered and swallowed.
    /// The first retryable error cancels the remaining work of the batch; the
    /// returned [`BatchError`] lists every record the queue should redeliver.
    pub async fn handle_batch(
        &self,
        token: &CancellationToken,
        records: Vec<QueueRecord>,
    ) -> Result<(), BatchError> {
        let batch_token = token.child_token();
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut pending = BTreeSet::new();
        let mut failures = Vec::new();

        info!(
            records = records.len(),
            concurrency = self.options.concurrency,
            "Handling queue batch"
        );

        for (index, record) in records.into_iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = batch_token.cancelled() => Err(WorkerError::Cancelled),
                permit = semaphore.clone().acquire_owned() => {
                    permit.map_err(|e| WorkerError::Internal(e.to_string()))
                }
            };

            let permit = match permit {
                Ok(permit) => permit,
                Err(error) => {
                    failures.push(RecordFailure { index, error });
                    continue;
                }
            };

            let worker = self.clone();
            let token = batch_token.clone();

            pending.insert(index);
            tasks.spawn(async move {
                let _permit = permit;
                (index, worker.process_record(&token, index, &record).await)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, failure)) => {
                    pending.remove(&index);
                    failures.extend(failure);
                }
                Err(join_error) => {
                    error!(error = %join_error, "Record task aborted");
                    batch_token.cancel();
                }
            }
        }

        // Whatever is still pending belongs to a task that panicked.
        for index in pending {
            failures.push(RecordFailure {
                index,
                error: WorkerError::Internal("record task panicked".to_string()),
            });
        }

        if failures.is_empty() {
            info!("Queue batch handled");
            return Ok(());
        }

        failures.sort_by_key(|failure| failure.index);
        error!(
            failed = failures.len(),
            "Queue batch finished with retryable failures"
        );

        Err(BatchError { failures })
    }

    async fn process_record(
        &self,
        token: &CancellationToken,
        index: usize,
        record: &QueueRecord,
    ) -> Option<RecordFailure> {
        match self.dispatch(token, record).await {
            Ok(()) => None,
            Err(error) if is_retryable(&error) => {
                error!(index, error = %error, "Record failed, requesting redelivery");
                token.cancel();
                Some(RecordFailure { index, error })
            }
            Err(error) => {
                warn!(index, error = %error, "Record failed permanently, acknowledging");
                dead_letter(&self.deps, &record.body, &error).await;
                None
            }
        }
    }
}

/// Best-effort copy of a dropped record to the failed queue.
pub(crate) async fn dead_letter(deps: &Dependencies, body: &[u8], reason: &WorkerError) {
    let Some(sink) = &deps.dead_letters else {
        return;
    };

    let message = DlqMessage {
        original_body: String::from_utf8_lossy(body).into_owned(),
        failure_reason: reason.to_string(),
        failed_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    };

    if let Err(e) = sink.publish_dead_letter(&message).await {
        warn!(error = %e, "Failed to publish dead letter");
    }
}

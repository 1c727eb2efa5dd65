//! RabbitMQ transport loop: groups deliveries into batches, hands them to the
//! worker and settles every delivery from the batch outcome.

use std::{sync::Arc, time::Duration};

use anyhow::{Error, Result, anyhow};
use futures_util::StreamExt;
use lapin::message::Delivery;
use tokio::time::{Instant, sleep_until, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    clients::rbmq::RabbitMqClient,
    config::Config,
    error::{BatchError, RecordFailure, WorkerError},
    models::{message::QueueRecord, status::Disposition},
    worker::Worker,
};

pub struct QueueConsumer {
    rabbitmq: Arc<RabbitMqClient>,
    worker: Worker,
    batch_size: usize,
    batch_window: Duration,
    batch_timeout: Duration,
}

impl QueueConsumer {
    pub fn new(rabbitmq: Arc<RabbitMqClient>, worker: Worker, config: &Config) -> Self {
        Self {
            rabbitmq,
            worker,
            batch_size: config.batch_size.max(1),
            batch_window: Duration::from_millis(config.batch_window_ms),
            batch_timeout: Duration::from_secs(config.batch_timeout_seconds),
        }
    }

    /// Consumes until `token` is cancelled or the broker closes the stream.
    pub async fn run(&self, token: CancellationToken) -> Result<(), Error> {
        let mut consumer = self.rabbitmq.create_consumer().await?;

        info!(
            batch_size = self.batch_size,
            batch_window_ms = self.batch_window.as_millis() as u64,
            "Queue consumer started"
        );

        loop {
            let first = tokio::select! {
                _ = token.cancelled() => break,
                next = consumer.next() => next,
            };

            let mut deliveries = match first {
                Some(Ok(delivery)) => vec![delivery],
                Some(Err(e)) => return Err(anyhow!("Failed to receive delivery: {}", e)),
                None => {
                    warn!("Consumer stream closed by broker");
                    break;
                }
            };

            let window_ends = Instant::now() + self.batch_window;

            while deliveries.len() < self.batch_size {
                let next = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = sleep_until(window_ends) => break,
                    next = consumer.next() => next,
                };

                match next {
                    Some(Ok(delivery)) => deliveries.push(delivery),
                    Some(Err(e)) => {
                        warn!(error = %e, "Delivery error while filling batch");
                        break;
                    }
                    None => break,
                }
            }

            self.process(&token, deliveries).await;
        }

        info!("Queue consumer stopped");

        Ok(())
    }

    async fn process(&self, token: &CancellationToken, deliveries: Vec<Delivery>) {
        let records: Vec<QueueRecord> = deliveries
            .iter()
            .map(|delivery| QueueRecord::new(delivery.data.clone()))
            .collect();
        let len = records.len();

        let outcome = match timeout(self.batch_timeout, self.worker.handle_batch(token, records))
            .await
            .map_err(WorkerError::from)
        {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(records = len, error = %e, "Batch timed out, requeueing all records");
                Err(BatchError {
                    failures: (0..len)
                        .map(|index| RecordFailure {
                            index,
                            error: WorkerError::DeadlineExceeded,
                        })
                        .collect(),
                })
            }
        };

        for (delivery, disposition) in deliveries.iter().zip(dispositions(len, &outcome)) {
            self.settle(delivery.delivery_tag, disposition).await;
        }
    }

    async fn settle(&self, delivery_tag: u64, disposition: Disposition) {
        let result = match disposition {
            Disposition::Ack => self.rabbitmq.acknowledge(delivery_tag).await,
            Disposition::Requeue => self.rabbitmq.reject(delivery_tag, true).await,
        };

        if let Err(e) = result {
            error!(delivery_tag, %disposition, error = %e, "Failed to settle delivery");
        }
    }
}

/// Maps a batch outcome to one settlement per record, in record order.
pub fn dispositions(len: usize, outcome: &Result<(), BatchError>) -> Vec<Disposition> {
    (0..len)
        .map(|index| match outcome {
            Err(batch) if batch.contains(index) => Disposition::Requeue,
            _ => Disposition::Ack,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_batch_acks_everything() {
        assert_eq!(dispositions(3, &Ok(())), vec![Disposition::Ack; 3]);
    }

    #[test]
    fn only_failed_records_are_requeued() {
        let outcome = Err(BatchError {
            failures: vec![RecordFailure {
                index: 1,
                error: WorkerError::Cancelled,
            }],
        });

        assert_eq!(
            dispositions(3, &outcome),
            vec![Disposition::Ack, Disposition::Requeue, Disposition::Ack]
        );
    }

    #[test]
    fn empty_batch_settles_nothing() {
        assert!(dispositions(0, &Ok(())).is_empty());
    }
}

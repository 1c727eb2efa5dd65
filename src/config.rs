use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;

use crate::{
    models::{
        circuit_breaker::CircuitBreakerConfig,
        retry::{RetryConfig, RetryStrategy},
    },
    worker::WorkerOptions,
};

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    pub rabbitmq_url: String,
    pub notify_queue_name: String,
    pub failed_queue_name: String,
    pub prefetch_count: u16,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_window_ms")]
    pub batch_window_ms: u64,
    #[serde(default = "default_batch_timeout_seconds")]
    pub batch_timeout_seconds: u64,

    pub redis_url: String,

    pub database_url: String,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,

    pub template_service_url: String,

    pub fcm_project_id: String,

    pub mail_api_url: String,
    pub mail_api_key: String,
    pub mail_from_address: String,
    pub mail_from_name: String,

    pub chat_webhook_url: String,

    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,

    pub circuit_breaker_failure_threshold: u32,
    pub circuit_breaker_timeout_seconds: u64,
    pub circuit_breaker_success_threshold: u32,

    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    #[serde(default = "default_retry_strategy")]
    pub retry_strategy: RetryStrategy,
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    #[serde(default)]
    pub retry_jitter: f64,
}

fn default_batch_size() -> usize {
    10
}

fn default_batch_window_ms() -> u64 {
    200
}

fn default_batch_timeout_seconds() -> u64 {
    60
}

fn default_database_max_connections() -> u32 {
    10
}

fn default_http_timeout_seconds() -> u64 {
    10
}

fn default_worker_concurrency() -> usize {
    1
}

fn default_max_retry_attempts() -> u32 {
    3
}

fn default_retry_strategy() -> RetryStrategy {
    RetryStrategy::Exponential
}

fn default_retry_interval_ms() -> u64 {
    1000
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        let config = envy::from_env::<Self>()
            .map_err(|e| anyhow!("Invalid or missing environmental variable: {}", e))?;

        if config.worker_concurrency == 0 {
            return Err(anyhow!("WORKER_CONCURRENCY must be at least 1"));
        }

        Ok(config)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retry_attempts,
            strategy: self.retry_strategy,
            interval_ms: self.retry_interval_ms,
            jitter: self.retry_jitter,
        }
    }

    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.circuit_breaker_failure_threshold,
            open_timeout: Duration::from_secs(self.circuit_breaker_timeout_seconds),
            success_threshold: self.circuit_breaker_success_threshold,
        }
    }

    pub fn worker_options(&self) -> WorkerOptions {
        WorkerOptions {
            concurrency: self.worker_concurrency,
            retry: self.retry_config(),
        }
    }
}

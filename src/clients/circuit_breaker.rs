use std::{
    future::Future,
    time::{SystemTime, UNIX_EPOCH},
};

use redis::{AsyncCommands, RedisResult, aio::MultiplexedConnection};
use tracing::{debug, info, warn};

use crate::{
    error::{ProviderErrorKind, WorkerError, is_retryable},
    models::circuit_breaker::{CircuitBreakerConfig, CircuitState},
};

/// Redis-backed breaker shared by every worker process calling one provider.
///
/// Only transient failures count towards opening the circuit. Redis trouble
/// never blocks a call: the breaker then behaves as closed.
#[derive(Clone)]
pub struct CircuitBreaker {
    provider: &'static str,
    connection: MultiplexedConnection,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(
        provider: &'static str,
        connection: MultiplexedConnection,
        config: CircuitBreakerConfig,
    ) -> Self {
        info!(provider, "Circuit breaker initialized");

        Self {
            provider,
            connection,
            config,
        }
    }

    pub async fn call<F, Fut, T>(&self, operation: F) -> Result<T, WorkerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, WorkerError>>,
    {
        match self.state().await {
            CircuitState::Open => {
                if self.should_attempt_reset().await {
                    info!(provider = self.provider, "Circuit breaker attempting reset");
                    self.log_redis_error(self.set_state(CircuitState::HalfOpen).await);
                    return self.try_operation(operation).await;
                }
                warn!(provider = self.provider, "Circuit breaker is open, rejecting request");
                Err(WorkerError::provider(
                    self.provider,
                    ProviderErrorKind::Unavailable,
                    "circuit breaker is open",
                ))
            }
            CircuitState::HalfOpen => {
                debug!(provider = self.provider, "Circuit breaker in half-open state");
                self.try_operation(operation).await
            }
            CircuitState::Closed => self.try_operation(operation).await,
        }
    }

    pub async fn state(&self) -> CircuitState {
        match self.get_state().await {
            Ok(state) => state,
            Err(e) => {
                warn!(provider = self.provider, error = %e, "Circuit breaker state unavailable");
                CircuitState::Closed
            }
        }
    }

    async fn try_operation<F, Fut, T>(&self, operation: F) -> Result<T, WorkerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, WorkerError>>,
    {
        match operation().await {
            Ok(result) => {
                let recorded = self.record_success().await;
                self.log_redis_error(recorded);
                Ok(result)
            }
            Err(e) => {
                if is_retryable(&e) {
                    let recorded = self.record_failure().await;
                    self.log_redis_error(recorded);
                }
                Err(e)
            }
        }
    }

    async fn record_success(&self) -> RedisResult<()> {
        let state = self.get_state().await?;

        if state == CircuitState::HalfOpen {
            let successes = self.increment_success_count().await?;
            debug!(
                provider = self.provider,
                successes,
                threshold = self.config.success_threshold,
                "Circuit breaker success recorded"
            );

            if successes >= self.config.success_threshold {
                self.set_state(CircuitState::Closed).await?;
                self.reset_counters().await?;
                info!(provider = self.provider, "Circuit breaker closed after successful recovery");
            }
        } else if state == CircuitState::Closed {
            self.reset_failure_count().await?;
        }

        Ok(())
    }

    async fn record_failure(&self) -> RedisResult<()> {
        let state = self.get_state().await?;

        if state == CircuitState::HalfOpen {
            self.set_state(CircuitState::Open).await?;
            self.set_opened_at().await?;
            warn!(
                provider = self.provider,
                "Circuit breaker reopened after failed recovery attempt"
            );
            return Ok(());
        }

        let failures = self.increment_failure_count().await?;
        debug!(
            provider = self.provider,
            failures,
            threshold = self.config.failure_threshold,
            "Circuit breaker failure recorded"
        );

        if failures >= self.config.failure_threshold {
            self.set_state(CircuitState::Open).await?;
            self.set_opened_at().await?;
            warn!(
                provider = self.provider,
                failures,
                "Circuit breaker opened due to consecutive failures"
            );
        }

        Ok(())
    }

    fn key(&self, suffix: &str) -> String {
        format!("circuit:{}:{}", self.provider, suffix)
    }

    async fn get_state(&self) -> RedisResult<CircuitState> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(self.key("state")).await?;

        Ok(CircuitState::parse(value.as_deref()))
    }

    async fn set_state(&self, state: CircuitState) -> RedisResult<()> {
        let mut conn = self.connection.clone();
        conn.set::<_, _, ()>(self.key("state"), state.as_str()).await
    }

    async fn increment_failure_count(&self) -> RedisResult<u32> {
        let mut conn = self.connection.clone();
        let key = self.key("failures");
        let count: u32 = conn.incr(&key, 1).await?;
        conn.expire::<_, ()>(&key, self.config.open_timeout.as_secs() as i64)
            .await?;
        Ok(count)
    }

    async fn reset_failure_count(&self) -> RedisResult<()> {
        let mut conn = self.connection.clone();
        conn.del::<_, ()>(self.key("failures")).await
    }

    async fn increment_success_count(&self) -> RedisResult<u32> {
        let mut conn = self.connection.clone();
        conn.incr(self.key("successes"), 1).await
    }

    async fn reset_counters(&self) -> RedisResult<()> {
        let mut conn = self.connection.clone();
        conn.del::<_, ()>(vec![
            self.key("failures"),
            self.key("successes"),
            self.key("opened_at"),
        ])
        .await
    }

    async fn set_opened_at(&self) -> RedisResult<()> {
        let mut conn = self.connection.clone();
        conn.set::<_, _, ()>(self.key("opened_at"), unix_now()).await
    }

    async fn should_attempt_reset(&self) -> bool {
        let mut conn = self.connection.clone();
        let opened_at: RedisResult<Option<u64>> = conn.get(self.key("opened_at")).await;

        match opened_at {
            Ok(Some(opened_at)) => self.config.reset_due(opened_at, unix_now()),
            Ok(None) => true,
            Err(e) => {
                warn!(provider = self.provider, error = %e, "Failed to read circuit opened_at");
                false
            }
        }
    }

    fn log_redis_error(&self, result: RedisResult<()>) {
        if let Err(e) = result {
            warn!(provider = self.provider, error = %e, "Failed to update circuit breaker");
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

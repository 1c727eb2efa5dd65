use anyhow::{Error, Result, anyhow};
use redis::{Client, aio::MultiplexedConnection};
use tracing::info;

use crate::{
    clients::circuit_breaker::CircuitBreaker, config::Config,
    models::circuit_breaker::CircuitBreakerConfig,
};

/// Shared Redis connection holding circuit breaker state.
pub struct RedisClient {
    connection: MultiplexedConnection,
    circuit_breaker_config: CircuitBreakerConfig,
}

impl RedisClient {
    pub async fn connect(config: &Config) -> Result<Self, Error> {
        info!("Connecting to Redis...");

        let client = Client::open(config.redis_url.as_str())
            .map_err(|e| anyhow!("Failed to create redis client: {}", e))?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| anyhow!("Failed to connect to redis client: {}", e))?;

        info!("Redis connection established");

        Ok(Self {
            connection,
            circuit_breaker_config: config.circuit_breaker_config(),
        })
    }

    pub fn circuit_breaker(&self, provider: &'static str) -> CircuitBreaker {
        CircuitBreaker::new(
            provider,
            self.connection.clone(),
            self.circuit_breaker_config.clone(),
        )
    }
}

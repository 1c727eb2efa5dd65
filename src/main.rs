use std::{sync::Arc, time::Duration};

use anyhow::{Error, Result, anyhow};
use notify_worker::{
    clients::{
        chat::ChatWebhookClient, database::DatabaseClient, fcm::FcmClient, mail::MailApiClient,
        rbmq::RabbitMqClient, redis::RedisClient, template::TemplateServiceClient,
    },
    config::Config,
    consumer::QueueConsumer,
    worker::{Dependencies, Worker},
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Error> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    init_tracing();

    let config = Config::load()?;
    let http_timeout = Duration::from_secs(config.http_timeout_seconds);

    let redis = RedisClient::connect(&config).await?;
    let database = Arc::new(DatabaseClient::connect(&config).await?);
    let templates = Arc::new(TemplateServiceClient::new(
        &config.template_service_url,
        http_timeout,
    )?);
    let mailer = Arc::new(
        MailApiClient::new(
            &config.mail_api_url,
            &config.mail_api_key,
            &config.mail_from_address,
            &config.mail_from_name,
            http_timeout,
        )?
        .with_circuit_breaker(redis.circuit_breaker("mail")),
    );
    let push = Arc::new(
        FcmClient::new(&config.fcm_project_id, http_timeout)
            .await?
            .with_circuit_breaker(redis.circuit_breaker("fcm")),
    );
    let chat = Arc::new(
        ChatWebhookClient::new(&config.chat_webhook_url, http_timeout)?
            .with_circuit_breaker(redis.circuit_breaker("chat")),
    );
    let rabbitmq = Arc::new(RabbitMqClient::connect(&config).await?);

    let deps = Dependencies {
        idempotency: database.clone(),
        directory: database.clone(),
        templates,
        messages: database,
        mailer,
        push,
        chat,
        dead_letters: Some(rabbitmq.clone()),
    };

    let worker = Worker::new(deps, config.worker_options());
    let consumer = QueueConsumer::new(rabbitmq, worker, &config);

    let token = CancellationToken::new();
    tokio::spawn(shutdown_signal(token.clone()));

    info!(
        queue = %config.notify_queue_name,
        concurrency = config.worker_concurrency,
        "Notification worker starting"
    );

    consumer.run(token).await?;

    info!("Notification worker stopped");

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }

    token.cancel();
}

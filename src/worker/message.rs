use chrono::SecondsFormat;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{WorkerError, is_retryable},
    models::{message::MessageConfig, recipient::NewMessage, template::TemplateFields},
    utils::retry_with_backoff,
    worker::dispatcher::ChannelContext,
};

/// Persists one in-app message per recipient id in a single bulk insert.
pub async fn send(ctx: &ChannelContext<'_>, config: &MessageConfig) -> Result<(), WorkerError> {
    let payload = ctx.payload;

    if config.template_id.is_empty() {
        return Err(WorkerError::invalid("message template id is required"));
    }

    if payload.user_ids.is_empty() {
        return Err(WorkerError::invalid("user ids are required for in-app messages"));
    }

    let template = ctx
        .deps
        .templates
        .message_template(&config.template_id)
        .await?;

    let fields = TemplateFields::from([
        ("title".to_string(), Value::from(config.title.as_str())),
        ("link".to_string(), Value::from(config.link.as_str())),
        (
            "receivedAt".to_string(),
            Value::from(config.received_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        ),
        ("eventType".to_string(), Value::from(payload.event_type.as_str())),
    ]);
    let content = template.build(&fields)?;

    let messages: Vec<NewMessage> = payload
        .user_ids
        .iter()
        .map(|user_id| NewMessage {
            id: Uuid::new_v4(),
            user_type: payload.user_type,
            user_id: user_id.clone(),
            message_type: config.message_type,
            title: content.title.clone(),
            body: content.body.clone(),
            link: config.link.clone(),
            received_at: config.received_at,
        })
        .collect();

    let backoff = ctx.retry.backoff();

    retry_with_backoff(
        ctx.token,
        backoff.as_ref(),
        || ctx.deps.messages.create_messages(&messages),
        Some(is_retryable),
    )
    .await?;

    info!(
        queue_id = %payload.queue_id,
        template_id = %config.template_id,
        messages = messages.len(),
        "In-app messages stored"
    );

    Ok(())
}

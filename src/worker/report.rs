use serde_json::Value;
use tracing::info;

use crate::{
    error::{WorkerError, is_retryable},
    models::{message::ReportConfig, template::TemplateFields},
    utils::retry_with_backoff,
    worker::dispatcher::ChannelContext,
};

/// Posts one rendered report to the internal chat room. Never looks at user ids.
pub async fn send(ctx: &ChannelContext<'_>, config: &ReportConfig) -> Result<(), WorkerError> {
    if config.template_id.is_empty() {
        return Err(WorkerError::invalid("report template id is required"));
    }

    let template = ctx
        .deps
        .templates
        .report_template(&config.template_id)
        .await?;

    let fields = TemplateFields::from([
        ("overview".to_string(), Value::from(config.overview.as_str())),
        ("link".to_string(), Value::from(config.link.as_str())),
        (
            "eventType".to_string(),
            Value::from(ctx.payload.event_type.as_str()),
        ),
    ]);
    let text = template.build(&fields)?;

    let backoff = ctx.retry.backoff();

    retry_with_backoff(
        ctx.token,
        backoff.as_ref(),
        || ctx.deps.chat.push_message(&text),
        Some(is_retryable),
    )
    .await?;

    info!(
        queue_id = %ctx.payload.queue_id,
        template_id = %config.template_id,
        "Report posted"
    );

    Ok(())
}

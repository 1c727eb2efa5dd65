use tracing::{debug, info, warn};

use crate::{
    error::{WorkerError, is_retryable},
    models::{
        message::{PushConfig, UserType},
        push::MulticastMessage,
        template::string_fields,
    },
    utils::{retry_with_backoff, validate_device_token},
    worker::dispatcher::ChannelContext,
};

pub async fn send(ctx: &ChannelContext<'_>, config: &PushConfig) -> Result<(), WorkerError> {
    if config.template_id.is_empty() {
        return Err(WorkerError::invalid("push template id is required"));
    }

    let tokens = device_tokens(ctx).await?;

    if tokens.is_empty() {
        debug!(queue_id = %ctx.payload.queue_id, "No device tokens resolved, skipping push");
        return Ok(());
    }

    let template = ctx.deps.templates.push_template(&config.template_id).await?;
    let content = template.build(&string_fields(&config.data))?;

    let message = MulticastMessage {
        tokens,
        title: content.title,
        body: content.body,
        image_url: template.image_url.clone(),
        data: config.data.clone(),
    };

    let backoff = ctx.retry.backoff();

    let response = retry_with_backoff(
        ctx.token,
        backoff.as_ref(),
        || ctx.deps.push.send_multicast(&message),
        Some(is_retryable),
    )
    .await?;

    if response.failure_count > 0 {
        warn!(
            queue_id = %ctx.payload.queue_id,
            success_count = response.success_count,
            failure_count = response.failure_count,
            "Push multicast partially failed"
        );
    } else {
        info!(
            queue_id = %ctx.payload.queue_id,
            success_count = response.success_count,
            "Push sent"
        );
    }

    Ok(())
}

/// Looks up device tokens and drops the ones that cannot be valid.
async fn device_tokens(ctx: &ChannelContext<'_>) -> Result<Vec<String>, WorkerError> {
    let payload = ctx.payload;

    let admin_family = payload.user_type.is_admin_family();

    if !admin_family && payload.user_type != UserType::User {
        return Err(WorkerError::invalid(format!(
            "unsupported user type for push: {}",
            payload.user_type.as_str()
        )));
    }

    if payload.user_ids.is_empty() {
        return Ok(Vec::new());
    }

    let tokens = if admin_family {
        ctx.deps.directory.admin_device_tokens(&payload.user_ids).await?
    } else {
        ctx.deps.directory.user_device_tokens(&payload.user_ids).await?
    };

    Ok(tokens
        .into_iter()
        .filter(|token| match validate_device_token(token) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Skipping invalid device token");
                false
            }
        })
        .collect())
}

use tracing::{debug, info};

use crate::{
    error::{WorkerError, is_retryable},
    models::{
        message::{MailConfig, UserType},
        recipient::Personalization,
    },
    utils::retry_with_backoff,
    worker::dispatcher::ChannelContext,
};

pub async fn send(ctx: &ChannelContext<'_>, config: &MailConfig) -> Result<(), WorkerError> {
    if config.email_id.is_empty() {
        return Err(WorkerError::invalid("email id is required"));
    }

    let personalizations = resolve_recipients(ctx, config).await?;

    if personalizations.is_empty() {
        debug!(queue_id = %ctx.payload.queue_id, "No mail recipients resolved, skipping");
        return Ok(());
    }

    let backoff = ctx.retry.backoff();

    retry_with_backoff(
        ctx.token,
        backoff.as_ref(),
        || {
            ctx.deps
                .mailer
                .send_multiple(&config.email_id, &personalizations)
        },
        Some(is_retryable),
    )
    .await?;

    info!(
        queue_id = %ctx.payload.queue_id,
        email_id = %config.email_id,
        recipients = personalizations.len(),
        "Mail sent"
    );

    Ok(())
}

async fn resolve_recipients(
    ctx: &ChannelContext<'_>,
    config: &MailConfig,
) -> Result<Vec<Personalization>, WorkerError> {
    let payload = ctx.payload;

    match payload.user_type {
        UserType::Guest => {
            let guest = payload
                .guest
                .as_ref()
                .ok_or_else(|| WorkerError::invalid("guest is required for guest mail"))?;

            if guest.email.is_empty() {
                return Ok(Vec::new());
            }

            Ok(vec![Personalization::to(
                &guest.name,
                &guest.email,
                &config.substitutions,
            )])
        }
        user_type if user_type.is_admin_family() => {
            if payload.user_ids.is_empty() {
                return Ok(Vec::new());
            }

            let admins = ctx.deps.directory.admins(&payload.user_ids).await?;

            Ok(admins
                .iter()
                .filter(|admin| !admin.email.is_empty())
                .map(|admin| {
                    Personalization::to(&admin.name(), &admin.email, &config.substitutions)
                })
                .collect())
        }
        UserType::User => {
            if payload.user_ids.is_empty() {
                return Ok(Vec::new());
            }

            let users = ctx.deps.directory.users(&payload.user_ids).await?;

            Ok(users
                .iter()
                .filter(|user| !user.email.is_empty())
                .map(|user| Personalization::to(&user.username, &user.email, &config.substitutions))
                .collect())
        }
        other => Err(WorkerError::invalid(format!(
            "unsupported user type for mail: {}",
            other.as_str()
        ))),
    }
}

//! Turns one queue record into channel sends.
//!
//! A record is decoded, checked against its idempotency record, fanned out to
//! every channel block it carries, and marked done once all of them succeed.

use std::{future::Future, pin::Pin};

use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    error::WorkerError,
    models::{message::WorkerPayload, queue::NotifyType, retry::RetryConfig},
    worker::{Dependencies, dead_letter, mail, message, push, report},
};

/// What every channel sender gets to work with.
pub struct ChannelContext<'a> {
    pub deps: &'a Dependencies,
    pub retry: &'a RetryConfig,
    pub token: &'a CancellationToken,
    pub payload: &'a WorkerPayload,
}

type ChannelSend<'a> = Pin<Box<dyn Future<Output = Result<(), WorkerError>> + Send + 'a>>;

pub async fn dispatch(
    deps: &Dependencies,
    retry: &RetryConfig,
    token: &CancellationToken,
    body: &[u8],
) -> Result<(), WorkerError> {
    let payload: WorkerPayload = match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(e) => {
            let err = WorkerError::from(e);
            warn!(error = %err, "Dropping malformed queue record");
            dead_letter(deps, body, &err).await;
            return Ok(());
        }
    };

    if payload.queue_id.is_empty() {
        return Err(WorkerError::invalid("queue id is required"));
    }

    let queue_id = payload.queue_id.as_str();

    debug!(
        queue_id,
        event_type = payload.event_type.as_str(),
        user_type = payload.user_type.as_str(),
        channels = payload.channel_count(),
        "Queue record decoded"
    );

    let received = deps.idempotency.get(queue_id).await?;

    if received.done {
        info!(queue_id, "Queue already processed, skipping");
        return Ok(());
    }

    let channel_token = token.child_token();
    let ctx = ChannelContext {
        deps,
        retry,
        token: &channel_token,
        payload: &payload,
    };

    let mut sends: Vec<ChannelSend<'_>> = Vec::with_capacity(4);

    if let Some(config) = &payload.email {
        sends.push(Box::pin(run_channel(&ctx, NotifyType::Email, mail::send(&ctx, config))));
    }
    if let Some(config) = &payload.push {
        sends.push(Box::pin(run_channel(&ctx, NotifyType::Push, push::send(&ctx, config))));
    }
    if let Some(config) = &payload.message {
        sends.push(Box::pin(run_channel(
            &ctx,
            NotifyType::Message,
            message::send(&ctx, config),
        )));
    }
    if let Some(config) = &payload.report {
        sends.push(Box::pin(run_channel(
            &ctx,
            NotifyType::Report,
            report::send(&ctx, config),
        )));
    }

    let results = join_all(sends).await;

    if let Some(err) = results.into_iter().find_map(Result::err) {
        return Err(err);
    }

    deps.idempotency.update_done(queue_id, true).await?;

    info!(queue_id, "Queue record processed");

    Ok(())
}

/// Runs one channel send; a failure cancels the sibling channels' retries.
async fn run_channel<F>(
    ctx: &ChannelContext<'_>,
    channel: NotifyType,
    send: F,
) -> Result<(), WorkerError>
where
    F: Future<Output = Result<(), WorkerError>>,
{
    let result = send.await;

    match &result {
        Ok(()) => debug!(
            queue_id = %ctx.payload.queue_id,
            channel = channel.as_str(),
            "Channel delivered"
        ),
        Err(e) => {
            warn!(
                queue_id = %ctx.payload.queue_id,
                channel = channel.as_str(),
                error = %e,
                "Channel failed"
            );
            ctx.token.cancel();
        }
    }

    result
}

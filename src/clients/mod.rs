//! External capabilities the worker depends on.
//!
//! Each trait has one production implementation in this module tree; tests
//! swap in in-memory doubles.

pub mod chat;
pub mod circuit_breaker;
pub mod database;
pub mod fcm;
pub mod mail;
pub mod rbmq;
pub mod redis;
pub mod template;

use async_trait::async_trait;

use crate::{
    error::WorkerError,
    models::{
        message::DlqMessage,
        push::{MulticastMessage, MulticastResponse},
        queue::ReceivedQueue,
        recipient::{Admin, NewMessage, Personalization, User},
        template::{MessageTemplate, PushTemplate, ReportTemplate},
    },
};

#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Fails with [`WorkerError::NotFound`] when no record exists.
    async fn get(&self, queue_id: &str) -> Result<ReceivedQueue, WorkerError>;

    async fn update_done(&self, queue_id: &str, done: bool) -> Result<(), WorkerError>;
}

#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    async fn admins(&self, ids: &[String]) -> Result<Vec<Admin>, WorkerError>;

    async fn users(&self, ids: &[String]) -> Result<Vec<User>, WorkerError>;

    async fn admin_device_tokens(&self, ids: &[String]) -> Result<Vec<String>, WorkerError>;

    async fn user_device_tokens(&self, ids: &[String]) -> Result<Vec<String>, WorkerError>;
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn push_template(&self, id: &str) -> Result<PushTemplate, WorkerError>;

    async fn message_template(&self, id: &str) -> Result<MessageTemplate, WorkerError>;

    async fn report_template(&self, id: &str) -> Result<ReportTemplate, WorkerError>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Inserts all rows in one statement.
    async fn create_messages(&self, messages: &[NewMessage]) -> Result<(), WorkerError>;
}

#[async_trait]
pub trait MailClient: Send + Sync {
    async fn send_multiple(
        &self,
        email_id: &str,
        personalizations: &[Personalization],
    ) -> Result<(), WorkerError>;
}

#[async_trait]
pub trait PushClient: Send + Sync {
    async fn send_multicast(
        &self,
        message: &MulticastMessage,
    ) -> Result<MulticastResponse, WorkerError>;
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn push_message(&self, text: &str) -> Result<(), WorkerError>;
}

#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn publish_dead_letter(&self, message: &DlqMessage) -> Result<(), WorkerError>;
}

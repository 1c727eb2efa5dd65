#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use notify_worker::{
    clients::{
        ChatClient, DeadLetterSink, IdempotencyStore, MailClient, MessageStore, PushClient,
        RecipientDirectory, TemplateStore,
    },
    error::{ProviderErrorKind, WorkerError},
    models::{
        message::{DlqMessage, EventType, QueueRecord, UserType},
        push::{MulticastMessage, MulticastResponse},
        queue::{NotifyType, ReceivedQueue},
        recipient::{Admin, NewMessage, Personalization, User},
        retry::{RetryConfig, RetryStrategy},
        template::{MessageTemplate, PushTemplate, ReportTemplate},
    },
    worker::{Dependencies, Worker, WorkerOptions},
};
use serde_json::Value;

pub const DEVICE_TOKEN: &str = "fcm-device-token-0001:abcdefghij";

pub fn unavailable(provider: &'static str) -> WorkerError {
    WorkerError::provider(provider, ProviderErrorKind::Unavailable, "service unavailable")
}

pub fn invalid_argument(provider: &'static str) -> WorkerError {
    WorkerError::provider(provider, ProviderErrorKind::InvalidArgument, "bad request")
}

/// Retry policy with millisecond waits so tests do not sleep for real.
pub fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        strategy: RetryStrategy::Fixed,
        interval_ms: 1,
        jitter: 0.0,
    }
}

pub fn record(payload: Value) -> QueueRecord {
    QueueRecord::new(payload.to_string())
}

/// Outcome queue for a scripted client: queued failures are returned first,
/// then every call succeeds.
#[derive(Default)]
pub struct Script {
    calls: AtomicUsize,
    failures: Mutex<VecDeque<WorkerError>>,
    always: Mutex<Option<ProviderErrorKind>>,
    delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Script {
    pub fn fail_next(&self, error: WorkerError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn fail_always(&self, kind: ProviderErrorKind) {
        *self.always.lock().unwrap() = Some(kind);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn next(&self, provider: &'static str) -> Result<(), WorkerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        match *self.always.lock().unwrap() {
            Some(kind) => Err(WorkerError::provider(provider, kind, "scripted failure")),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct MemoryIdempotency {
    rows: Mutex<HashMap<String, ReceivedQueue>>,
    failing_gets: Mutex<HashSet<String>>,
    pub updates: Mutex<Vec<String>>,
    pub update_script: Script,
}

impl MemoryIdempotency {
    pub fn insert(&self, id: &str, done: bool) {
        let now = Utc::now();

        self.rows.lock().unwrap().insert(
            id.to_string(),
            ReceivedQueue {
                id: id.to_string(),
                notify_type: NotifyType::Email,
                event_type: EventType::LiveNotification,
                user_type: UserType::User,
                user_ids: Vec::new(),
                done,
                created_at: now,
                updated_at: now,
            },
        );
    }

    /// `get` for `id` fails with a retryable error.
    pub fn fail_get(&self, id: &str) {
        self.failing_gets.lock().unwrap().insert(id.to_string());
    }

    pub fn is_done(&self, id: &str) -> bool {
        self.rows
            .lock()
            .unwrap()
            .get(id)
            .is_some_and(|row| row.done)
    }

    pub fn update_count(&self, id: &str) -> usize {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .filter(|updated| updated.as_str() == id)
            .count()
    }
}

#[async_trait]
impl IdempotencyStore for MemoryIdempotency {
    async fn get(&self, queue_id: &str) -> Result<ReceivedQueue, WorkerError> {
        if self.failing_gets.lock().unwrap().contains(queue_id) {
            return Err(WorkerError::Internal("connection reset".to_string()));
        }

        self.rows
            .lock()
            .unwrap()
            .get(queue_id)
            .cloned()
            .ok_or_else(|| WorkerError::NotFound(format!("received queue {}", queue_id)))
    }

    async fn update_done(&self, queue_id: &str, done: bool) -> Result<(), WorkerError> {
        self.update_script.next("database").await?;
        self.updates.lock().unwrap().push(queue_id.to_string());

        match self.rows.lock().unwrap().get_mut(queue_id) {
            Some(row) => {
                row.done = done;
                Ok(())
            }
            None => Err(WorkerError::NotFound(format!("received queue {}", queue_id))),
        }
    }
}

#[derive(Default)]
pub struct MemoryDirectory {
    pub admins: Mutex<Vec<Admin>>,
    pub users: Mutex<Vec<User>>,
    pub admin_tokens: Mutex<Vec<String>>,
    pub user_tokens: Mutex<Vec<String>>,
    pub lookups: AtomicUsize,
}

impl MemoryDirectory {
    pub fn add_admin(&self, id: &str, lastname: &str, firstname: &str, email: &str) {
        self.admins.lock().unwrap().push(Admin {
            id: id.to_string(),
            lastname: lastname.to_string(),
            firstname: firstname.to_string(),
            email: email.to_string(),
        });
    }

    pub fn add_user(&self, id: &str, username: &str, email: &str) {
        self.users.lock().unwrap().push(User {
            id: id.to_string(),
            username: username.to_string(),
            email: email.to_string(),
        });
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecipientDirectory for MemoryDirectory {
    async fn admins(&self, ids: &[String]) -> Result<Vec<Admin>, WorkerError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .admins
            .lock()
            .unwrap()
            .iter()
            .filter(|admin| ids.contains(&admin.id))
            .cloned()
            .collect())
    }

    async fn users(&self, ids: &[String]) -> Result<Vec<User>, WorkerError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|user| ids.contains(&user.id))
            .cloned()
            .collect())
    }

    async fn admin_device_tokens(&self, _ids: &[String]) -> Result<Vec<String>, WorkerError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.admin_tokens.lock().unwrap().clone())
    }

    async fn user_device_tokens(&self, _ids: &[String]) -> Result<Vec<String>, WorkerError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.user_tokens.lock().unwrap().clone())
    }
}

pub struct MemoryTemplates {
    push: HashMap<String, PushTemplate>,
    message: HashMap<String, MessageTemplate>,
    report: HashMap<String, ReportTemplate>,
    pub fetches: AtomicUsize,
}

impl Default for MemoryTemplates {
    fn default() -> Self {
        let push = PushTemplate {
            id: "push-order".to_string(),
            title: "Order {{order}}".to_string(),
            body: "Hi {{name}}, your order is ready".to_string(),
            image_url: Some("https://cdn.example.com/order.png".to_string()),
        };
        let message = MessageTemplate {
            id: "message-live".to_string(),
            title: "{{title}}".to_string(),
            body: "{{eventType}} received at {{receivedAt}}, see {{link}}".to_string(),
        };
        let report = ReportTemplate {
            id: "report-contact".to_string(),
            body: "[{{eventType}}] {{overview}} {{link}}".to_string(),
        };

        Self {
            push: HashMap::from([(push.id.clone(), push)]),
            message: HashMap::from([(message.id.clone(), message)]),
            report: HashMap::from([(report.id.clone(), report)]),
            fetches: AtomicUsize::new(0),
        }
    }
}

impl MemoryTemplates {
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TemplateStore for MemoryTemplates {
    async fn push_template(&self, id: &str) -> Result<PushTemplate, WorkerError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.push
            .get(id)
            .cloned()
            .ok_or_else(|| WorkerError::NotFound(format!("push template {}", id)))
    }

    async fn message_template(&self, id: &str) -> Result<MessageTemplate, WorkerError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.message
            .get(id)
            .cloned()
            .ok_or_else(|| WorkerError::NotFound(format!("message template {}", id)))
    }

    async fn report_template(&self, id: &str) -> Result<ReportTemplate, WorkerError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.report
            .get(id)
            .cloned()
            .ok_or_else(|| WorkerError::NotFound(format!("report template {}", id)))
    }
}

#[derive(Default)]
pub struct RecordingMessages {
    pub script: Script,
    pub stored: Mutex<Vec<NewMessage>>,
}

#[async_trait]
impl MessageStore for RecordingMessages {
    async fn create_messages(&self, messages: &[NewMessage]) -> Result<(), WorkerError> {
        self.script.next("database").await?;
        self.stored.lock().unwrap().extend_from_slice(messages);
        Ok(())
    }
}

#[derive(Default)]
pub struct ScriptedMailer {
    pub script: Script,
    pub sent: Mutex<Vec<(String, Vec<Personalization>)>>,
}

#[async_trait]
impl MailClient for ScriptedMailer {
    async fn send_multiple(
        &self,
        email_id: &str,
        personalizations: &[Personalization],
    ) -> Result<(), WorkerError> {
        self.script.next("mail").await?;
        self.sent
            .lock()
            .unwrap()
            .push((email_id.to_string(), personalizations.to_vec()));
        Ok(())
    }
}

#[derive(Default)]
pub struct ScriptedPush {
    pub script: Script,
    pub sent: Mutex<Vec<MulticastMessage>>,
    rejected_tokens: Mutex<HashSet<String>>,
}

impl ScriptedPush {
    /// The given device token is rejected by the provider on every send.
    pub fn reject_token(&self, token: &str) {
        self.rejected_tokens.lock().unwrap().insert(token.to_string());
    }
}

#[async_trait]
impl PushClient for ScriptedPush {
    async fn send_multicast(
        &self,
        message: &MulticastMessage,
    ) -> Result<MulticastResponse, WorkerError> {
        self.script.next("fcm").await?;
        self.sent.lock().unwrap().push(message.clone());

        let rejected = self.rejected_tokens.lock().unwrap().clone();
        MulticastResponse::collect(message.tokens.iter().map(|token| {
            let result = if rejected.contains(token) {
                Err(WorkerError::provider("fcm", ProviderErrorKind::NotFound, "UNREGISTERED"))
            } else {
                Ok(())
            };
            (token.clone(), result)
        }))
    }
}

#[derive(Default)]
pub struct ScriptedChat {
    pub script: Script,
    pub posted: Mutex<Vec<String>>,
}

#[async_trait]
impl ChatClient for ScriptedChat {
    async fn push_message(&self, text: &str) -> Result<(), WorkerError> {
        self.script.next("chat").await?;
        self.posted.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingDeadLetters {
    pub published: Mutex<Vec<DlqMessage>>,
}

#[async_trait]
impl DeadLetterSink for RecordingDeadLetters {
    async fn publish_dead_letter(&self, message: &DlqMessage) -> Result<(), WorkerError> {
        self.published.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Every collaborator of the worker as an in-memory double.
#[derive(Default)]
pub struct Harness {
    pub idempotency: Arc<MemoryIdempotency>,
    pub directory: Arc<MemoryDirectory>,
    pub templates: Arc<MemoryTemplates>,
    pub messages: Arc<RecordingMessages>,
    pub mailer: Arc<ScriptedMailer>,
    pub push: Arc<ScriptedPush>,
    pub chat: Arc<ScriptedChat>,
    pub dead_letters: Arc<RecordingDeadLetters>,
}

impl Harness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deps(&self) -> Dependencies {
        Dependencies {
            idempotency: self.idempotency.clone(),
            directory: self.directory.clone(),
            templates: self.templates.clone(),
            messages: self.messages.clone(),
            mailer: self.mailer.clone(),
            push: self.push.clone(),
            chat: self.chat.clone(),
            dead_letters: Some(self.dead_letters.clone()),
        }
    }

    pub fn worker(&self, concurrency: usize, max_retries: u32) -> Worker {
        Worker::new(
            self.deps(),
            WorkerOptions {
                concurrency,
                retry: fast_retry(max_retries),
            },
        )
    }

    /// Calls made to any delivery client or message store.
    pub fn delivery_calls(&self) -> usize {
        self.mailer.script.calls()
            + self.push.script.calls()
            + self.chat.script.calls()
            + self.messages.script.calls()
    }

    pub fn dead_letter_count(&self) -> usize {
        self.dead_letters.published.lock().unwrap().len()
    }
}

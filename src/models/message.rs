use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Business origin of a notification. Only feeds template fields and logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    AdminRegistered,
    AdminPasswordReset,
    ContactReceived,
    LiveNotification,
    OrderCaptured,
    ScheduleApproved,
    #[default]
    #[serde(other)]
    Unknown,
}

impl EventType {
    pub fn from_string(s: &str) -> Self {
        match s {
            "admin-registered" => Self::AdminRegistered,
            "admin-password-reset" => Self::AdminPasswordReset,
            "contact-received" => Self::ContactReceived,
            "live-notification" => Self::LiveNotification,
            "order-captured" => Self::OrderCaptured,
            "schedule-approved" => Self::ScheduleApproved,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::AdminRegistered => "admin-registered",
            Self::AdminPasswordReset => "admin-password-reset",
            Self::ContactReceived => "contact-received",
            Self::LiveNotification => "live-notification",
            Self::OrderCaptured => "order-captured",
            Self::ScheduleApproved => "schedule-approved",
            Self::Unknown => "unknown",
        }
    }
}

/// Recipient category; picks the lookup strategy of each sender.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Admin,
    Administrator,
    Coordinator,
    Producer,
    User,
    Guest,
    #[default]
    #[serde(other)]
    Unknown,
}

impl UserType {
    pub fn from_string(s: &str) -> Self {
        match s {
            "admin" => Self::Admin,
            "administrator" => Self::Administrator,
            "coordinator" => Self::Coordinator,
            "producer" => Self::Producer,
            "user" => Self::User,
            "guest" => Self::Guest,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Admin => "admin",
            Self::Administrator => "administrator",
            Self::Coordinator => "coordinator",
            Self::Producer => "producer",
            Self::User => "user",
            Self::Guest => "guest",
            Self::Unknown => "unknown",
        }
    }

    /// Admin, administrator, coordinator and producer share the admin directory.
    pub fn is_admin_family(&self) -> bool {
        matches!(
            self,
            Self::Admin | Self::Administrator | Self::Coordinator | Self::Producer
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    System,
    Notification,
    #[default]
    #[serde(other)]
    Unknown,
}

impl MessageType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::System => "system",
            Self::Notification => "notification",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guest {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailConfig {
    pub email_id: String,
    #[serde(default)]
    pub substitutions: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushConfig {
    pub template_id: String,
    #[serde(default)]
    pub data: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageConfig {
    pub template_id: String,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportConfig {
    pub template_id: String,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub link: String,
}

/// One notification intent as carried by a queue record body.
///
/// Every channel block is independent: any combination may be present, and
/// a missing block means the channel is skipped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerPayload {
    pub queue_id: String,
    #[serde(default)]
    pub event_type: EventType,
    #[serde(default)]
    pub user_type: UserType,
    #[serde(default)]
    pub user_ids: Vec<String>,
    #[serde(default)]
    pub guest: Option<Guest>,
    #[serde(default)]
    pub email: Option<MailConfig>,
    #[serde(default)]
    pub push: Option<PushConfig>,
    #[serde(default)]
    pub message: Option<MessageConfig>,
    #[serde(default)]
    pub report: Option<ReportConfig>,
}

impl WorkerPayload {
    pub fn channel_count(&self) -> usize {
        [
            self.email.is_some(),
            self.push.is_some(),
            self.message.is_some(),
            self.report.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }
}

/// Raw queue record handed over by the transport.
#[derive(Debug, Clone, Default)]
pub struct QueueRecord {
    pub body: Vec<u8>,
}

impl QueueRecord {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self { body: body.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqMessage {
    pub original_body: String,
    pub failure_reason: String,
    pub failed_at: String,
}

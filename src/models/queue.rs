use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::message::{EventType, UserType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyType {
    Email,
    Push,
    Message,
    Report,
    Unknown,
}

impl NotifyType {
    pub fn from_string(s: &str) -> Self {
        match s {
            "email" => Self::Email,
            "push" => Self::Push,
            "message" => Self::Message,
            "report" => Self::Report,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Email => "email",
            Self::Push => "push",
            Self::Message => "message",
            Self::Report => "report",
            Self::Unknown => "unknown",
        }
    }
}

/// Idempotency record of one queued notification.
///
/// `done` only ever moves from `false` to `true`, after every channel of the
/// record was delivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivedQueue {
    pub id: String,
    pub notify_type: NotifyType,
    pub event_type: EventType,
    pub user_type: UserType,
    pub user_ids: Vec<String>,
    pub done: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

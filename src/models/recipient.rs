use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::message::{MessageType, UserType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admin {
    pub id: String,
    pub lastname: String,
    pub firstname: String,
    pub email: String,
}

impl Admin {
    pub fn name(&self) -> String {
        format!("{} {}", self.lastname, self.firstname)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonalizationType {
    To,
    Cc,
    Bcc,
}

/// One resolved mail recipient and the substitutions rendered for them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Personalization {
    pub name: String,
    pub address: String,
    #[serde(rename = "type")]
    pub kind: PersonalizationType,
    pub substitutions: HashMap<String, serde_json::Value>,
}

impl Personalization {
    /// A `To` recipient carrying `substitutions` plus its own `name`.
    pub fn to(name: &str, address: &str, substitutions: &HashMap<String, String>) -> Self {
        let mut fields: HashMap<String, serde_json::Value> = substitutions
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        fields.insert(
            "name".to_string(),
            serde_json::Value::String(name.to_string()),
        );

        Self {
            name: name.to_string(),
            address: address.to_string(),
            kind: PersonalizationType::To,
            substitutions: fields,
        }
    }
}

/// In-app message row written by the message channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub id: Uuid,
    pub user_type: UserType,
    pub user_id: String,
    pub message_type: MessageType,
    pub title: String,
    pub body: String,
    pub link: String,
    pub received_at: DateTime<Utc>,
}

use std::collections::HashMap;

use serde::Serialize;

use crate::models::recipient::{Personalization, PersonalizationType};

#[derive(Debug, Clone, Serialize)]
pub struct MailAddress {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MailPersonalization {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<MailAddress>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<MailAddress>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<MailAddress>,
    pub dynamic_template_data: HashMap<String, serde_json::Value>,
}

impl From<&Personalization> for MailPersonalization {
    fn from(p: &Personalization) -> Self {
        let address = MailAddress {
            email: p.address.clone(),
            name: p.name.clone(),
        };

        let mut personalization = Self {
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            dynamic_template_data: p.substitutions.clone(),
        };

        match p.kind {
            PersonalizationType::To => personalization.to.push(address),
            PersonalizationType::Cc => personalization.cc.push(address),
            PersonalizationType::Bcc => personalization.bcc.push(address),
        }

        personalization
    }
}

/// Body of a templated multi-recipient send.
#[derive(Debug, Clone, Serialize)]
pub struct MailRequest {
    pub from: MailAddress,
    pub template_id: String,
    pub personalizations: Vec<MailPersonalization>,
}

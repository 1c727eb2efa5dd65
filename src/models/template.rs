use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::WorkerError;

pub type TemplateFields = HashMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateContent {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushTemplate {
    pub id: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl PushTemplate {
    pub fn build(&self, fields: &TemplateFields) -> Result<TemplateContent, WorkerError> {
        Ok(TemplateContent {
            title: render(&self.title, fields)?,
            body: render(&self.body, fields)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub id: String,
    pub title: String,
    pub body: String,
}

impl MessageTemplate {
    pub fn build(&self, fields: &TemplateFields) -> Result<TemplateContent, WorkerError> {
        Ok(TemplateContent {
            title: render(&self.title, fields)?,
            body: render(&self.body, fields)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportTemplate {
    pub id: String,
    pub body: String,
}

impl ReportTemplate {
    pub fn build(&self, fields: &TemplateFields) -> Result<String, WorkerError> {
        render(&self.body, fields)
    }
}

/// Replaces every `{{key}}` in `template` with its field value.
///
/// The template is scanned once from left to right, so substituted text is
/// never expanded again. Only scalar values are accepted, and a placeholder
/// without a value fails the build.
pub fn render(template: &str, variables: &TemplateFields) -> Result<String, WorkerError> {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start + 2..].find("}}") else {
            break;
        };

        let placeholder = &rest[start..start + len + 4];
        let key = &placeholder[2..placeholder.len() - 2];

        let Some(value) = variables.get(key) else {
            warn!(
                missing_variable = %placeholder,
                "Template contains unreplaced variable"
            );

            return Err(WorkerError::Template(format!(
                "Missing variable in template: {}",
                placeholder
            )));
        };

        result.push_str(&rest[..start]);
        result.push_str(&scalar(key, value)?);
        rest = &rest[start + len + 4..];
    }

    result.push_str(rest);

    Ok(result)
}

fn scalar(key: &str, value: &Value) -> Result<String, WorkerError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        _ => Err(WorkerError::Template(format!(
            "Unsupported variable type for key '{}'",
            key
        ))),
    }
}

pub fn string_fields(values: &HashMap<String, String>) -> TemplateFields {
    values
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect()
}

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::validation::ValidationError;

/// A stored prompt with `{variable}` placeholders. `{{` and `}}` are literal braces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptTemplate {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub prompt_template: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

enum Piece<'a> {
    Text(&'a str),
    Var(&'a str),
}

/// Split a template into literal text and placeholder names.
fn pieces(template: &str) -> Result<Vec<Piece<'_>>, ValidationError> {
    let mut out = Vec::new();
    let mut rest = template;
    while let Some(pos) = rest.find(['{', '}']) {
        if pos > 0 {
            out.push(Piece::Text(&rest[..pos]));
        }
        let tail = &rest[pos..];
        if tail.starts_with("{{") {
            out.push(Piece::Text("{"));
            rest = &tail[2..];
        } else if tail.starts_with("}}") {
            out.push(Piece::Text("}"));
            rest = &tail[2..];
        } else if tail.starts_with('}') {
            return Err(unbalanced(template));
        } else {
            let end = tail.find('}').ok_or_else(|| unbalanced(template))?;
            let name = &tail[1..end];
            if name.is_empty() || name.contains('{') {
                return Err(unbalanced(template));
            }
            out.push(Piece::Var(name));
            rest = &tail[end + 1..];
        }
    }
    if !rest.is_empty() {
        out.push(Piece::Text(rest));
    }
    Ok(out)
}

fn unbalanced(template: &str) -> ValidationError {
    ValidationError::InvalidField {
        field: "prompt_template",
        reason: format!("unbalanced braces in `{template}`"),
    }
}

impl PromptTemplate {
    /// Placeholder names, sorted and deduplicated.
    pub fn variables(&self) -> Result<Vec<String>, ValidationError> {
        let names: BTreeSet<&str> = pieces(&self.prompt_template)?
            .into_iter()
            .filter_map(|p| match p {
                Piece::Var(name) => Some(name),
                Piece::Text(_) => None,
            })
            .collect();
        Ok(names.into_iter().map(String::from).collect())
    }

    /// JSON schema of the template inputs: every placeholder is a string.
    pub fn prompt_schema(&self) -> Result<Map<String, Value>, ValidationError> {
        Ok(self
            .variables()?
            .into_iter()
            .map(|name| (name, json!({"type": "string"})))
            .collect())
    }

    /// Fill every placeholder from `values`. Strings are inserted as-is, other values as JSON.
    pub fn compile(&self, values: &Map<String, Value>) -> Result<String, ValidationError> {
        let mut out = String::with_capacity(self.prompt_template.len());
        for piece in pieces(&self.prompt_template)? {
            match piece {
                Piece::Text(text) => out.push_str(text),
                Piece::Var(name) => match values.get(name) {
                    Some(Value::String(s)) => out.push_str(s),
                    Some(other) => out.push_str(&other.to_string()),
                    None => {
                        return Err(ValidationError::InvalidField {
                            field: "prompt_template",
                            reason: format!("no value for `{name}`"),
                        })
                    }
                },
            }
        }
        Ok(out)
    }
}

/// Body of `POST /api/v1/prompt-templates/create`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePromptTemplateRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub prompt_template: String,
}

impl CreatePromptTemplateRequest {
    pub fn new(name: impl Into<String>, prompt_template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            prompt_template: prompt_template.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::InvalidField {
                field: "name",
                reason: "must not be empty".to_string(),
            });
        }
        pieces(&self.prompt_template).map(|_| ())
    }
}

/// Body of `PATCH /api/v1/prompt-templates/{id}`. Only set fields are changed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePromptTemplateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_template: Option<String>,
}

impl UpdatePromptTemplateRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.prompt_template {
            Some(t) => pieces(t).map(|_| ()),
            None => Ok(()),
        }
    }
}

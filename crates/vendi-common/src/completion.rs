use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::validation::{check_structured_output, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Body of `POST /api/v1/providers/chat/completions`.
///
/// Defaults mirror the platform's own: temperature 0.7, top_p 1, top_k 40,
/// presence penalty 0.5, 256 max tokens, one choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub max_tokens: u32,
    pub n: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_schema: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,

    /// Fine-tuned checkpoint to run instead of the base model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<String>,

    /// Correlation id; the platform de-duplicates retries carrying the same value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// Selects the OpenAI-compatible response shape instead of the native one.
    #[serde(default)]
    pub openai_compatible: bool,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: 0.7,
            top_p: 1.0,
            top_k: 40,
            frequency_penalty: 0.0,
            presence_penalty: 0.5,
            max_tokens: 256,
            n: 1,
            stop: None,
            json_schema: None,
            regex: None,
            checkpoint: None,
            request_id: None,
            openai_compatible: false,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p;
        self
    }

    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_penalties(mut self, frequency: f32, presence: f32) -> Self {
        self.frequency_penalty = frequency;
        self.presence_penalty = presence;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_n(mut self, n: u32) -> Self {
        self.n = n;
        self
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn with_json_schema(mut self, schema: Value) -> Self {
        self.json_schema = Some(schema);
        self
    }

    pub fn with_regex(mut self, regex: impl Into<String>) -> Self {
        self.regex = Some(regex.into());
        self
    }

    pub fn with_checkpoint(mut self, checkpoint: impl Into<String>) -> Self {
        self.checkpoint = Some(checkpoint.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn openai_compatible(mut self, enabled: bool) -> Self {
        self.openai_compatible = enabled;
        self
    }

    /// Same prompt and sampling parameters against a different model.
    pub fn for_model(&self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.model.trim().is_empty() {
            return Err(ValidationError::EmptyModel);
        }
        if self.messages.is_empty() {
            return Err(ValidationError::EmptyMessages);
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(ValidationError::InvalidField {
                field: "top_p",
                reason: format!("{} is outside [0, 1]", self.top_p),
            });
        }
        check_structured_output(self.json_schema.as_ref(), self.regex.as_deref())
    }
}

/// Body of `POST /api/v1/providers/completions-many`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManyCompletionsRequest {
    pub requests: Vec<CompletionRequest>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

// ── OpenAI-compatible shape ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletion {
    pub id: String,
    #[serde(default = "default_object")]
    pub object: String,
    #[serde(default)]
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

fn default_object() -> String {
    "chat.completion".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatChoice {
    pub index: u32,
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

// ── Platform-native shape ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NativeCompletion {
    pub id: String,
    pub model: String,
    #[serde(default)]
    pub request_id: Option<String>,
    pub choices: Vec<NativeChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
    /// Server-side latency in milliseconds.
    #[serde(default)]
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NativeChoice {
    pub index: u32,
    pub text: String,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// A completion in whichever shape the request asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    OpenAi(ChatCompletion),
    Native(NativeCompletion),
}

impl Completion {
    pub fn id(&self) -> &str {
        match self {
            Completion::OpenAi(c) => &c.id,
            Completion::Native(c) => &c.id,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Completion::OpenAi(c) => &c.model,
            Completion::Native(c) => &c.model,
        }
    }

    /// Text of the first choice.
    pub fn text(&self) -> Option<&str> {
        match self {
            Completion::OpenAi(c) => c.choices.first().map(|ch| ch.message.content.as_str()),
            Completion::Native(c) => c.choices.first().map(|ch| ch.text.as_str()),
        }
    }

    pub fn usage(&self) -> Option<&Usage> {
        match self {
            Completion::OpenAi(c) => c.usage.as_ref(),
            Completion::Native(c) => c.usage.as_ref(),
        }
    }

    /// Decode `body` using the shape selected by `openai_compatible`.
    pub fn from_value(body: Value, openai_compatible: bool) -> Result<Self, serde_json::Error> {
        if openai_compatible {
            serde_json::from_value(body).map(Completion::OpenAi)
        } else {
            serde_json::from_value(body).map(Completion::Native)
        }
    }
}

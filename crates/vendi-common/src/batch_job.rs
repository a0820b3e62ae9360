use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::validation::{check_structured_output, ValidationError};

/// Server-side status of a batch job. Only the platform moves a job between states.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchJobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl BatchJobStatus {
    /// `Completed` and `Failed` never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, BatchJobStatus::Completed | BatchJobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BatchJobStatus::Pending => "PENDING",
            BatchJobStatus::Running => "RUNNING",
            BatchJobStatus::Completed => "COMPLETED",
            BatchJobStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for BatchJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One model configuration applied to every row of the batch dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelParameters {
    /// `<provider>/<model_id>`, e.g. "openai/gpt-4".
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_schema: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
}

impl ModelParameters {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
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

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.model.trim().is_empty() {
            return Err(ValidationError::EmptyModel);
        }
        check_structured_output(self.json_schema.as_ref(), self.regex.as_deref())
    }
}

/// Body of `POST /api/v1/providers/batch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBatchJobRequest {
    pub dataset_id: String,
    pub model_parameters: Vec<ModelParameters>,
}

impl CreateBatchJobRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.model_parameters.is_empty() {
            return Err(ValidationError::EmptyModelParameters);
        }
        for params in &self.model_parameters {
            params.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchJob {
    pub id: String,
    pub dataset_id: String,

    #[serde(default)]
    pub model_parameters: Vec<ModelParameters>,

    pub status: BatchJobStatus,

    /// Only populated once `status` is `Completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dataset_id: Option<String>,
}

impl BatchJob {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

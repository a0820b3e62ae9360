use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::validation::ValidationError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrainStatus {
    Scheduled,
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Crashed,
    Paused,
    Cancelling,
}

impl TrainStatus {
    /// No further transitions happen on the platform side.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TrainStatus::Completed | TrainStatus::Failed | TrainStatus::Cancelled | TrainStatus::Crashed
        )
    }
}

impl fmt::Display for TrainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrainStatus::Scheduled => "SCHEDULED",
            TrainStatus::Pending => "PENDING",
            TrainStatus::Running => "RUNNING",
            TrainStatus::Completed => "COMPLETED",
            TrainStatus::Failed => "FAILED",
            TrainStatus::Cancelled => "CANCELLED",
            TrainStatus::Crashed => "CRASHED",
            TrainStatus::Paused => "PAUSED",
            TrainStatus::Cancelling => "CANCELLING",
        };
        f.write_str(s)
    }
}

/// LoRA fine-tuning hyperparameters. Defaults match what the platform assumes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainParameters {
    pub model_max_length: u32,
    pub split_eval: f32,
    pub eval_steps: u32,
    pub save_steps: u32,
    pub per_device_train_batch_size: u32,
    pub per_device_eval_batch_size: u32,
    pub num_train_epochs: u32,
    pub max_steps: u32,
    pub save_total_limit: u32,
    pub load_best_model_at_end: bool,
    pub learning_rate: f64,
    pub gradient_accumulation_steps: u32,
    pub warmup_steps: u32,
    pub warmup_ratio: f32,
    pub lora_r: u32,
    pub lora_alpha: u32,
    pub lora_dropout: f32,
    pub lora_target_modules: Vec<String>,
    pub q_lora: bool,
}

impl Default for TrainParameters {
    fn default() -> Self {
        Self {
            model_max_length: 1024,
            split_eval: 0.1,
            eval_steps: 10,
            save_steps: 50,
            per_device_train_batch_size: 1,
            per_device_eval_batch_size: 1,
            num_train_epochs: 3,
            max_steps: 50,
            save_total_limit: 5,
            load_best_model_at_end: true,
            learning_rate: 0.00002,
            gradient_accumulation_steps: 1,
            warmup_steps: 0,
            warmup_ratio: 0.03,
            lora_r: 32,
            lora_alpha: 32,
            lora_dropout: 0.05,
            lora_target_modules: [
                "q_proj", "o_proj", "up_proj", "v_proj", "gate_proj", "down_proj", "k_proj",
                "lm_head",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            q_lora: true,
        }
    }
}

impl TrainParameters {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(0.0..1.0).contains(&self.split_eval) {
            return Err(ValidationError::InvalidField {
                field: "split_eval",
                reason: format!("{} is outside [0, 1)", self.split_eval),
            });
        }
        if !(0.0..1.0).contains(&self.lora_dropout) {
            return Err(ValidationError::InvalidField {
                field: "lora_dropout",
                reason: format!("{} is outside [0, 1)", self.lora_dropout),
            });
        }
        if self.learning_rate <= 0.0 {
            return Err(ValidationError::InvalidField {
                field: "learning_rate",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Body of `POST /v1/train/train-lora`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTrainJobRequest {
    pub run_name: String,
    pub model_name: String,
    pub model_description: String,
    pub dataset_id: String,
    #[serde(default)]
    pub compute_resource: Option<String>,
    #[serde(default)]
    pub training_params: TrainParameters,
}

impl CreateTrainJobRequest {
    pub fn new(
        run_name: impl Into<String>,
        model_name: impl Into<String>,
        dataset_id: impl Into<String>,
    ) -> Self {
        Self {
            run_name: run_name.into(),
            model_name: model_name.into(),
            model_description: String::new(),
            dataset_id: dataset_id.into(),
            compute_resource: None,
            training_params: TrainParameters::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.model_description = description.into();
        self
    }

    pub fn with_compute_resource(mut self, resource: impl Into<String>) -> Self {
        self.compute_resource = Some(resource.into());
        self
    }

    pub fn with_training_params(mut self, params: TrainParameters) -> Self {
        self.training_params = params;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.model_name.trim().is_empty() {
            return Err(ValidationError::EmptyModel);
        }
        for (field, value) in [("run_name", &self.run_name), ("dataset_id", &self.dataset_id)] {
            if value.trim().is_empty() {
                return Err(ValidationError::InvalidField {
                    field,
                    reason: "must not be empty".to_string(),
                });
            }
        }
        self.training_params.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainJob {
    pub id: String,
    /// Id of the model the run produces; also the key for its logs.
    pub model_id: String,
    #[serde(default)]
    pub prefect_flow_id: Option<String>,
    #[serde(rename = "type_", default)]
    pub kind: String,
    pub status: TrainStatus,
    /// Dataset id the run trains on.
    pub dataset: String,
    pub base_model: String,
    #[serde(default)]
    pub compute_resource: Option<String>,
    #[serde(default)]
    pub training_params: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Training logs and metric series for one fine-tuned model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TrainData {
    #[serde(default)]
    pub logs: Vec<Value>,
    #[serde(default)]
    pub chart: Vec<Value>,
    #[serde(default)]
    pub run_config: Value,
}

use vendi_common::{CreateTrainJobRequest, ModelInfo, TrainData, TrainJob};

use crate::error::Result;
use crate::http::HttpClient;
use crate::models::Models;

const TRAIN_PATH: &str = "/v1/train";

/// Fine-tuning provider whose base models can be trained.
pub const FINETUNE_PROVIDER: &str = "vendi";

/// LoRA fine-tuning runs.
#[derive(Debug, Clone)]
pub struct Finetune {
    http: HttpClient,
}

impl Finetune {
    pub(crate) fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Start a fine-tuning run over an uploaded dataset.
    pub async fn run(&self, request: &CreateTrainJobRequest) -> Result<TrainJob> {
        request.validate()?;
        let job: TrainJob = self
            .http
            .post(&format!("{TRAIN_PATH}/train-lora"), request)
            .await?;
        tracing::info!(
            train_job_id = %job.id,
            model_id = %job.model_id,
            base_model = %job.base_model,
            status = %job.status,
            "fine-tuning run started"
        );
        Ok(job)
    }

    /// Logs and metric series for the model a run produces.
    pub async fn logs(&self, model_id: &str) -> Result<TrainData> {
        self.http
            .get(&format!("{TRAIN_PATH}/trainings/{model_id}/data"))
            .await
    }

    /// Base models that accept fine-tuning.
    pub async fn available_models(&self) -> Result<Vec<ModelInfo>> {
        Models::new(self.http.clone()).list(FINETUNE_PROVIDER).await
    }
}

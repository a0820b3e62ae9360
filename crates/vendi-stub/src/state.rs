use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use uuid::Uuid;
use vendi_common::{
    BatchJob, BatchJobStatus, CreateBatchJobRequest, CreatePromptTemplateRequest,
    CreateTrainJobRequest, Dataset, Deployment, ModelInfo, PromptTemplate, TrainData, TrainJob,
    TrainStatus, UpdatePromptTemplateRequest,
};

/// How submitted batch jobs progress.
#[derive(Debug, Clone)]
pub struct StubConfig {
    /// Bearer token every request must carry. `None` disables the check.
    pub api_key: Option<String>,
    /// Status polls answered with a non-terminal status before the job finishes.
    /// `None` keeps jobs running forever.
    pub polls_until_done: Option<u32>,
    /// Status reported once a job finishes.
    pub final_status: BatchJobStatus,
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            polls_until_done: Some(3),
            final_status: BatchJobStatus::Completed,
        }
    }
}

#[derive(Debug, Clone)]
struct JobEntry {
    job: BatchJob,
    polls: u32,
}

#[derive(Debug, Clone)]
pub struct StoredDataset {
    pub dataset: Dataset,
    pub rows: Vec<Value>,
}

/// In-memory platform state shared by all handlers.
#[derive(Clone)]
pub struct StubState {
    inner: Arc<Inner>,
}

struct Inner {
    config: StubConfig,
    jobs: DashMap<String, JobEntry>,
    datasets: DashMap<String, StoredDataset>,
    deployments: DashMap<String, Deployment>,
    models: DashMap<String, Vec<ModelInfo>>,
    /// Keyed by the produced model id, which is what logs are fetched by.
    trainings: DashMap<String, TrainJob>,
    templates: DashMap<String, PromptTemplate>,
    requests_total: AtomicU64,
    last_project_id: Mutex<Option<String>>,
}

impl StubState {
    pub fn new(config: StubConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                jobs: DashMap::new(),
                datasets: DashMap::new(),
                deployments: DashMap::new(),
                models: DashMap::new(),
                trainings: DashMap::new(),
                templates: DashMap::new(),
                requests_total: AtomicU64::new(0),
                last_project_id: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &StubConfig {
        &self.inner.config
    }

    /// Requests that reached the server, including rejected ones.
    pub fn requests_total(&self) -> u64 {
        self.inner.requests_total.load(Ordering::Relaxed)
    }

    pub(crate) fn record_request(&self, project_id: Option<String>) {
        self.inner.requests_total.fetch_add(1, Ordering::Relaxed);
        if let Some(p) = project_id {
            if let Ok(mut last) = self.inner.last_project_id.lock() {
                *last = Some(p);
            }
        }
    }

    /// Most recent `X-Project-Id` header seen.
    pub fn last_project_id(&self) -> Option<String> {
        self.inner
            .last_project_id
            .lock()
            .ok()
            .and_then(|p| p.clone())
    }

    // datasets

    pub fn insert_dataset(&self, name: &str, rows: Vec<Value>) -> Dataset {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let dataset = Dataset {
            id: id.clone(),
            name: name.to_string(),
            path: format!("datasets/{id}.jsonl"),
            storage: Some("memory".to_string()),
            created_at: now,
            updated_at: now,
        };
        self.inner.datasets.insert(
            id,
            StoredDataset {
                dataset: dataset.clone(),
                rows,
            },
        );
        dataset
    }

    pub fn dataset(&self, id: &str) -> Option<StoredDataset> {
        self.inner.datasets.get(id).map(|d| d.clone())
    }

    pub fn datasets(&self) -> Vec<Dataset> {
        let mut out: Vec<Dataset> = self
            .inner
            .datasets
            .iter()
            .map(|d| d.dataset.clone())
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        out
    }

    pub fn remove_dataset(&self, id: &str) -> bool {
        self.inner.datasets.remove(id).is_some()
    }

    // batch jobs

    pub fn create_job(&self, req: CreateBatchJobRequest) -> BatchJob {
        let job = BatchJob {
            id: Uuid::new_v4().to_string(),
            dataset_id: req.dataset_id,
            model_parameters: req.model_parameters,
            status: BatchJobStatus::Pending,
            output_dataset_id: None,
        };
        self.inner.jobs.insert(
            job.id.clone(),
            JobEntry {
                job: job.clone(),
                polls: 0,
            },
        );
        job
    }

    /// Status poll: advances the job by one step and returns the new view.
    pub fn poll_job(&self, id: &str) -> Option<BatchJob> {
        let (job, finished) = {
            let mut entry = self.inner.jobs.get_mut(id)?;
            if entry.job.is_terminal() {
                return Some(entry.job.clone());
            }
            entry.polls += 1;
            let done = matches!(self.inner.config.polls_until_done, Some(n) if entry.polls > n);
            if done {
                entry.job.status = self.inner.config.final_status;
            } else if entry.polls > 1 {
                entry.job.status = BatchJobStatus::Running;
            }
            (entry.job.clone(), done)
        };
        if finished && job.status == BatchJobStatus::Completed {
            let rows = self
                .dataset(&job.dataset_id)
                .map(|d| d.rows)
                .unwrap_or_default();
            let output = self.insert_dataset(&format!("{}-output", job.id), rows);
            if let Some(mut entry) = self.inner.jobs.get_mut(id) {
                entry.job.output_dataset_id = Some(output.id.clone());
                return Some(entry.job.clone());
            }
        }
        Some(job)
    }

    /// Current view without advancing.
    pub fn job(&self, id: &str) -> Option<BatchJob> {
        self.inner.jobs.get(id).map(|e| e.job.clone())
    }

    pub fn job_polls(&self, id: &str) -> Option<u32> {
        self.inner.jobs.get(id).map(|e| e.polls)
    }

    // deployments

    pub fn insert_deployment(&self, deployment: Deployment) {
        self.inner
            .deployments
            .insert(deployment.id.clone(), deployment);
    }

    pub fn deployment(&self, id: &str) -> Option<Deployment> {
        self.inner.deployments.get(id).map(|d| d.clone())
    }

    pub fn deployments(&self) -> Vec<Deployment> {
        let mut out: Vec<Deployment> = self
            .inner
            .deployments
            .iter()
            .map(|d| d.clone())
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn update_deployment<R>(&self, id: &str, f: impl FnOnce(&mut Deployment) -> R) -> Option<R> {
        self.inner.deployments.get_mut(id).map(|mut d| f(&mut *d))
    }

    pub fn remove_deployment(&self, id: &str) -> bool {
        self.inner.deployments.remove(id).is_some()
    }

    // models

    pub fn insert_models(&self, provider: &str, models: Vec<ModelInfo>) {
        self.inner.models.insert(provider.to_string(), models);
    }

    pub fn models(&self, provider: &str) -> Vec<ModelInfo> {
        self.inner
            .models
            .get(provider)
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    // fine-tuning

    pub fn create_training(&self, req: CreateTrainJobRequest) -> TrainJob {
        let now = Utc::now();
        let job = TrainJob {
            id: Uuid::new_v4().to_string(),
            model_id: Uuid::new_v4().to_string(),
            prefect_flow_id: Some(Uuid::new_v4().to_string()),
            kind: "lora".to_string(),
            status: TrainStatus::Scheduled,
            dataset: req.dataset_id,
            base_model: req.model_name,
            compute_resource: req.compute_resource,
            training_params: serde_json::to_value(&req.training_params).unwrap_or(Value::Null),
            created_at: now,
            updated_at: now,
        };
        self.inner.trainings.insert(job.model_id.clone(), job.clone());
        job
    }

    pub fn training(&self, model_id: &str) -> Option<TrainJob> {
        self.inner.trainings.get(model_id).map(|j| j.clone())
    }

    /// Logs for a run: one entry per recorded state plus its run config.
    pub fn training_data(&self, model_id: &str) -> Option<TrainData> {
        let job = self.training(model_id)?;
        Some(TrainData {
            logs: vec![serde_json::json!({
                "status": job.status,
                "message": format!("{} on {}", job.base_model, job.dataset),
            })],
            chart: Vec::new(),
            run_config: job.training_params,
        })
    }

    // prompt templates

    pub fn create_template(&self, req: CreatePromptTemplateRequest) -> PromptTemplate {
        let now = Utc::now();
        let template = PromptTemplate {
            id: Uuid::new_v4().to_string(),
            name: req.name,
            description: req.description,
            prompt_template: req.prompt_template,
            created_at: now,
            updated_at: now,
        };
        self.inner
            .templates
            .insert(template.id.clone(), template.clone());
        template
    }

    pub fn template(&self, id: &str) -> Option<PromptTemplate> {
        self.inner.templates.get(id).map(|t| t.clone())
    }

    pub fn templates(&self) -> Vec<PromptTemplate> {
        let mut out: Vec<PromptTemplate> =
            self.inner.templates.iter().map(|t| t.clone()).collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        out
    }

    pub fn update_template(
        &self,
        id: &str,
        req: UpdatePromptTemplateRequest,
    ) -> Option<PromptTemplate> {
        let mut template = self.inner.templates.get_mut(id)?;
        if let Some(name) = req.name {
            template.name = name;
        }
        if let Some(text) = req.prompt_template {
            template.prompt_template = text;
        }
        template.updated_at = Utc::now();
        Some(template.clone())
    }

    pub fn remove_template(&self, id: &str) -> bool {
        self.inner.templates.remove(id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vendi_common::ModelParameters;

    fn submit(state: &StubState) -> BatchJob {
        let ds = state.insert_dataset("input", vec![serde_json::json!({"q": 1})]);
        state.create_job(CreateBatchJobRequest {
            dataset_id: ds.id,
            model_parameters: vec![ModelParameters::new("openai/gpt-4")],
        })
    }

    #[test]
    fn test_job_completes_after_configured_polls() {
        let state = StubState::new(StubConfig::default());
        let job = submit(&state);
        assert_eq!(job.status, BatchJobStatus::Pending);

        assert_eq!(state.poll_job(&job.id).unwrap().status, BatchJobStatus::Pending);
        assert_eq!(state.poll_job(&job.id).unwrap().status, BatchJobStatus::Running);
        assert_eq!(state.poll_job(&job.id).unwrap().status, BatchJobStatus::Running);
        let done = state.poll_job(&job.id).unwrap();
        assert_eq!(done.status, BatchJobStatus::Completed);

        let output = state.dataset(done.output_dataset_id.as_deref().unwrap()).unwrap();
        assert_eq!(output.rows.len(), 1);

        // terminal jobs stop advancing
        assert_eq!(state.poll_job(&job.id).unwrap(), done);
        assert_eq!(state.job_polls(&job.id), Some(4));
    }

    #[test]
    fn test_job_never_completes() {
        let state = StubState::new(StubConfig {
            polls_until_done: None,
            ..StubConfig::default()
        });
        let job = submit(&state);
        for _ in 0..20 {
            assert!(!state.poll_job(&job.id).unwrap().is_terminal());
        }
    }

    #[test]
    fn test_failed_job_has_no_output() {
        let state = StubState::new(StubConfig {
            polls_until_done: Some(0),
            final_status: BatchJobStatus::Failed,
            ..StubConfig::default()
        });
        let job = submit(&state);
        let done = state.poll_job(&job.id).unwrap();
        assert_eq!(done.status, BatchJobStatus::Failed);
        assert!(done.output_dataset_id.is_none());
    }

    #[test]
    fn test_training_is_keyed_by_model_id() {
        let state = StubState::new(StubConfig::default());
        let job = state.create_training(CreateTrainJobRequest::new("run", "mistral-7b", "ds-1"));
        assert_eq!(job.status, TrainStatus::Scheduled);
        assert!(state.training(&job.id).is_none());
        let data = state.training_data(&job.model_id).unwrap();
        assert_eq!(data.run_config["lora_r"], 32);
        assert_eq!(data.logs.len(), 1);
    }

    #[test]
    fn test_template_update_keeps_unset_fields() {
        let state = StubState::new(StubConfig::default());
        let t = state.create_template(
            CreatePromptTemplateRequest::new("greet", "Hi {name}").with_description("hello"),
        );
        let updated = state
            .update_template(
                &t.id,
                UpdatePromptTemplateRequest {
                    prompt_template: Some("Hello {name}".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "greet");
        assert_eq!(updated.description.as_deref(), Some("hello"));
        assert_eq!(updated.prompt_template, "Hello {name}");
        assert!(state.remove_template(&t.id));
        assert!(state.update_template(&t.id, Default::default()).is_none());
    }
}

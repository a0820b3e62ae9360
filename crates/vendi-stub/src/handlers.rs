use std::collections::HashMap;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use vendi_common::dataset::from_json_lines;
use vendi_common::{
    ChatChoice, ChatCompletion, ChatMessage, CompletionRequest, CreateBatchJobRequest,
    CreateDeploymentRequest, CreatePromptTemplateRequest, CreateTrainJobRequest, Deployment,
    DeploymentStatus, DownloadLink, ManyCompletionsRequest, NativeChoice, NativeCompletion,
    UpdateDeploymentRequest, UpdatePromptTemplateRequest, Usage,
};

use crate::state::StubState;

fn error(status: StatusCode, detail: impl Into<String>) -> Response {
    (status, Json(json!({ "detail": detail.into() }))).into_response()
}

fn not_found(what: &str, id: &str) -> Response {
    error(StatusCode::NOT_FOUND, format!("{what} {id} not found"))
}

/// Counts every request and enforces the bearer token when one is configured.
pub async fn authenticate(
    State(st): State<StubState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, std::convert::Infallible> {
    let project_id = req
        .headers()
        .get("x-project-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    st.record_request(project_id);

    if let Some(expected) = st.config().api_key.as_deref() {
        let token = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if token != Some(expected) {
            return Ok(error(StatusCode::UNAUTHORIZED, "invalid api key"));
        }
    }
    Ok(next.run(req).await)
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

// batch jobs

pub async fn create_batch_job(
    State(st): State<StubState>,
    Json(req): Json<CreateBatchJobRequest>,
) -> Response {
    if let Err(e) = req.validate() {
        return error(StatusCode::BAD_REQUEST, e.to_string());
    }
    if st.dataset(&req.dataset_id).is_none() {
        return not_found("dataset", &req.dataset_id);
    }
    let job = st.create_job(req);
    tracing::info!(job_id = %job.id, dataset_id = %job.dataset_id, "batch job created");
    (StatusCode::OK, Json(job)).into_response()
}

pub async fn get_batch_job(State(st): State<StubState>, Path(id): Path<String>) -> Response {
    match st.poll_job(&id) {
        Some(job) => (StatusCode::OK, Json(job)).into_response(),
        None => not_found("batch job", &id),
    }
}

// completions

fn count_tokens(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

fn reply_text(req: &CompletionRequest) -> String {
    if req.json_schema.is_some() {
        return "{}".to_string();
    }
    let prompt = req.messages.last().map(|m| m.content.as_str()).unwrap_or("");
    format!("echo: {prompt}")
}

fn complete(req: &CompletionRequest) -> Value {
    let text = reply_text(req);
    let prompt_tokens: u32 = req.messages.iter().map(|m| count_tokens(&m.content)).sum();
    let completion_tokens = count_tokens(&text) * req.n.max(1);
    let usage = Usage {
        prompt_tokens,
        completion_tokens,
        total_tokens: prompt_tokens + completion_tokens,
    };
    let id = Uuid::new_v4().to_string();
    let n = req.n.max(1);

    let body = if req.openai_compatible {
        serde_json::to_value(ChatCompletion {
            id: format!("chatcmpl-{id}"),
            object: "chat.completion".to_string(),
            created: Utc::now().timestamp().max(0) as u64,
            model: req.model.clone(),
            choices: (0..n)
                .map(|index| ChatChoice {
                    index,
                    message: ChatMessage::assistant(text.clone()),
                    finish_reason: Some("stop".to_string()),
                })
                .collect(),
            usage: Some(usage),
        })
    } else {
        serde_json::to_value(NativeCompletion {
            id,
            model: req.model.clone(),
            request_id: req.request_id.clone(),
            choices: (0..n)
                .map(|index| NativeChoice {
                    index,
                    text: text.clone(),
                    finish_reason: Some("stop".to_string()),
                })
                .collect(),
            usage: Some(usage),
            latency_ms: Some(0),
        })
    };
    body.unwrap_or(Value::Null)
}

pub async fn chat_completions(Json(req): Json<CompletionRequest>) -> Response {
    if let Err(e) = req.validate() {
        return error(StatusCode::BAD_REQUEST, e.to_string());
    }
    (StatusCode::OK, Json(complete(&req))).into_response()
}

pub async fn completions_many(Json(req): Json<ManyCompletionsRequest>) -> Response {
    for r in &req.requests {
        if let Err(e) = r.validate() {
            return error(StatusCode::BAD_REQUEST, e.to_string());
        }
    }
    let out: Vec<Value> = req.requests.iter().map(complete).collect();
    (StatusCode::OK, Json(out)).into_response()
}

pub async fn list_models(State(st): State<StubState>, Path(provider): Path<String>) -> Response {
    let mut out = HashMap::new();
    out.insert(provider.clone(), st.models(&provider));
    (StatusCode::OK, Json(out)).into_response()
}

// datasets

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub name: Option<String>,
}

pub async fn upload_dataset(
    State(st): State<StubState>,
    Query(q): Query<UploadQuery>,
    body: String,
) -> Response {
    let Some(name) = q.name.filter(|n| !n.trim().is_empty()) else {
        return error(StatusCode::BAD_REQUEST, "missing dataset name");
    };
    let rows = match from_json_lines(&body) {
        Ok(rows) => rows,
        Err(e) => return error(StatusCode::BAD_REQUEST, format!("invalid JSON-lines body: {e}")),
    };
    let dataset = st.insert_dataset(&name, rows);
    tracing::info!(dataset_id = %dataset.id, name = %dataset.name, "dataset uploaded");
    (StatusCode::OK, Json(dataset)).into_response()
}

pub async fn list_datasets(State(st): State<StubState>) -> Response {
    (StatusCode::OK, Json(st.datasets())).into_response()
}

pub async fn get_dataset(State(st): State<StubState>, Path(id): Path<String>) -> Response {
    match st.dataset(&id) {
        Some(d) => (StatusCode::OK, Json(d.dataset)).into_response(),
        None => not_found("dataset", &id),
    }
}

pub async fn delete_dataset(State(st): State<StubState>, Path(id): Path<String>) -> Response {
    if st.remove_dataset(&id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        not_found("dataset", &id)
    }
}

pub async fn dataset_download_link(
    State(st): State<StubState>,
    Path(id): Path<String>,
) -> Response {
    match st.dataset(&id) {
        Some(d) => {
            let link = DownloadLink {
                url: format!("memory://{}", d.dataset.path),
                expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
            };
            (StatusCode::OK, Json(link)).into_response()
        }
        None => not_found("dataset", &id),
    }
}

// deployments

pub async fn list_deployments(State(st): State<StubState>) -> Response {
    (StatusCode::OK, Json(st.deployments())).into_response()
}

pub async fn get_deployment(State(st): State<StubState>, Path(id): Path<String>) -> Response {
    match st.deployment(&id) {
        Some(d) => (StatusCode::OK, Json(d)).into_response(),
        None => not_found("deployment", &id),
    }
}

pub async fn create_deployment(
    State(st): State<StubState>,
    Json(req): Json<CreateDeploymentRequest>,
) -> Response {
    if req.name.trim().is_empty() {
        return error(StatusCode::BAD_REQUEST, "deployment name is empty");
    }
    let id = Uuid::new_v4().to_string();
    let deployment = Deployment {
        address: format!("http://{id}.deployments.local"),
        id,
        name: req.name,
        provider: "vendi".to_string(),
        model_configuration: req.model_configuration,
        scale_to_zero: req.scale_to_zero,
        scale_to_zero_timeout_seconds: req.scale_to_zero_timeout_seconds,
        status: DeploymentStatus::NotReady,
    };
    st.insert_deployment(deployment.clone());
    tracing::info!(deployment_id = %deployment.id, model = %req.model_id, "deployment created");
    (StatusCode::OK, Json(deployment)).into_response()
}

pub async fn update_deployment(
    State(st): State<StubState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateDeploymentRequest>,
) -> Response {
    let updated = st.update_deployment(&id, |d| {
        if let Some(v) = req.scale_to_zero {
            d.scale_to_zero = v;
        }
        if let Some(v) = req.scale_to_zero_timeout_seconds {
            d.scale_to_zero_timeout_seconds = v;
        }
        d.clone()
    });
    match updated {
        Some(d) => (StatusCode::OK, Json(d)).into_response(),
        None => not_found("deployment", &id),
    }
}

fn set_status(st: &StubState, id: &str, status: DeploymentStatus) -> Response {
    match st.update_deployment(id, |d| {
        d.status = status;
        d.clone()
    }) {
        Some(d) => (StatusCode::OK, Json(d)).into_response(),
        None => not_found("deployment", id),
    }
}

pub async fn start_deployment(State(st): State<StubState>, Path(id): Path<String>) -> Response {
    set_status(&st, &id, DeploymentStatus::Live)
}

pub async fn stop_deployment(State(st): State<StubState>, Path(id): Path<String>) -> Response {
    set_status(&st, &id, DeploymentStatus::Stopped)
}

pub async fn delete_deployment(State(st): State<StubState>, Path(id): Path<String>) -> Response {
    if st.remove_deployment(&id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        not_found("deployment", &id)
    }
}

// fine-tuning

pub async fn train_lora(
    State(st): State<StubState>,
    Json(req): Json<CreateTrainJobRequest>,
) -> Response {
    if let Err(e) = req.validate() {
        return error(StatusCode::BAD_REQUEST, e.to_string());
    }
    if st.dataset(&req.dataset_id).is_none() {
        return not_found("dataset", &req.dataset_id);
    }
    let job = st.create_training(req);
    tracing::info!(train_job_id = %job.id, model_id = %job.model_id, "training scheduled");
    (StatusCode::OK, Json(job)).into_response()
}

pub async fn training_data(State(st): State<StubState>, Path(model_id): Path<String>) -> Response {
    match st.training_data(&model_id) {
        Some(data) => (StatusCode::OK, Json(data)).into_response(),
        None => not_found("training", &model_id),
    }
}

// prompt templates

pub async fn create_template(
    State(st): State<StubState>,
    Json(req): Json<CreatePromptTemplateRequest>,
) -> Response {
    if let Err(e) = req.validate() {
        return error(StatusCode::BAD_REQUEST, e.to_string());
    }
    (StatusCode::OK, Json(st.create_template(req))).into_response()
}

pub async fn list_templates(State(st): State<StubState>) -> Response {
    (StatusCode::OK, Json(st.templates())).into_response()
}

pub async fn get_template(State(st): State<StubState>, Path(id): Path<String>) -> Response {
    match st.template(&id) {
        Some(t) => (StatusCode::OK, Json(t)).into_response(),
        None => not_found("prompt template", &id),
    }
}

pub async fn update_template(
    State(st): State<StubState>,
    Path(id): Path<String>,
    Json(req): Json<UpdatePromptTemplateRequest>,
) -> Response {
    if let Err(e) = req.validate() {
        return error(StatusCode::BAD_REQUEST, e.to_string());
    }
    match st.update_template(&id, req) {
        Some(t) => (StatusCode::OK, Json(t)).into_response(),
        None => not_found("prompt template", &id),
    }
}

pub async fn delete_template(State(st): State<StubState>, Path(id): Path<String>) -> Response {
    if st.remove_template(&id) {
        (StatusCode::OK, Json(true)).into_response()
    } else {
        not_found("prompt template", &id)
    }
}

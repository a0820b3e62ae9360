//! In-memory stand-in for the Vendi platform REST API.
//!
//! Batch jobs advance one step per status poll, completions echo the last
//! message, fine-tuning runs are recorded but never train, and everything else
//! is plain CRUD over [`StubState`].

pub mod args;
pub mod handlers;
pub mod state;

use std::net::SocketAddr;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::task::JoinHandle;

pub use state::{StoredDataset, StubConfig, StubState};

use crate::handlers::*;

pub fn router(st: StubState) -> Router {
    let api = Router::new()
        .route("/api/v1/providers/batch", post(create_batch_job))
        .route("/api/v1/providers/batch/:id", get(get_batch_job))
        .route("/api/v1/providers/chat/completions", post(chat_completions))
        .route("/api/v1/providers/completions-many", post(completions_many))
        .route("/api/v1/providers/:provider/models", get(list_models))
        .route("/api/v1/datasets", get(list_datasets).post(upload_dataset))
        .route("/api/v1/datasets/:id", get(get_dataset).delete(delete_dataset))
        .route("/api/v1/datasets/:id/download-link", get(dataset_download_link))
        .route("/v1/deployments/", get(list_deployments))
        .route("/v1/deployments/create/", post(create_deployment))
        .route(
            "/v1/deployments/:id",
            get(get_deployment)
                .patch(update_deployment)
                .delete(delete_deployment),
        )
        .route("/v1/deployments/:id/start", post(start_deployment))
        .route("/v1/deployments/:id/stop", post(stop_deployment))
        .route("/v1/train/train-lora", post(train_lora))
        .route("/v1/train/trainings/:model_id/data", get(training_data))
        .route("/api/v1/prompt-templates/", get(list_templates))
        .route("/api/v1/prompt-templates/create", post(create_template))
        .route(
            "/api/v1/prompt-templates/:id",
            get(get_template)
                .patch(update_template)
                .delete(delete_template),
        )
        .layer(middleware::from_fn_with_state(st.clone(), authenticate))
        .with_state(st);

    Router::new().route("/healthz", get(healthz)).merge(api)
}

/// A stub server running on a background task. Stops when dropped.
pub struct RunningStub {
    pub addr: SocketAddr,
    pub state: StubState,
    handle: JoinHandle<()>,
}

impl RunningStub {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for RunningStub {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Serve on an ephemeral loopback port.
pub async fn spawn(config: StubConfig) -> std::io::Result<RunningStub> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = StubState::new(config);
    let app = router(state.clone());
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "stub server stopped");
        }
    });
    tracing::debug!(%addr, "stub server listening");
    Ok(RunningStub {
        addr,
        state,
        handle,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_rejects_wrong_token_but_counts_request() {
        let stub = spawn(StubConfig {
            api_key: Some("secret".into()),
            ..StubConfig::default()
        })
        .await
        .unwrap();
        let http = reqwest::Client::new();

        let resp = http
            .get(format!("{}/api/v1/datasets", stub.base_url()))
            .bearer_auth("wrong")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 401);

        let resp = http
            .get(format!("{}/api/v1/datasets", stub.base_url()))
            .bearer_auth("secret")
            .header("X-Project-Id", "p-1")
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_success());
        assert_eq!(stub.state.requests_total(), 2);
        assert_eq!(stub.state.last_project_id().as_deref(), Some("p-1"));
    }

    #[tokio::test]
    async fn test_batch_against_unknown_dataset_is_404() {
        let stub = spawn(StubConfig::default()).await.unwrap();
        let resp = reqwest::Client::new()
            .post(format!("{}/api/v1/providers/batch", stub.base_url()))
            .json(&json!({"dataset_id": "missing", "model_parameters": [{"model": "openai/gpt-4"}]}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 404);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["detail"], "dataset missing not found");
    }

    #[tokio::test]
    async fn test_healthz_is_not_counted() {
        let stub = spawn(StubConfig::default()).await.unwrap();
        let resp = reqwest::get(format!("{}/healthz", stub.base_url()))
            .await
            .unwrap();
        assert!(resp.status().is_success());
        assert_eq!(stub.state.requests_total(), 0);
    }
}

use reqwest::Method;
use vendi_common::{CreateDeploymentRequest, Deployment, UpdateDeploymentRequest};

use crate::error::Result;
use crate::http::HttpClient;

const DEPLOYMENTS_PATH: &str = "/v1/deployments";

#[derive(Debug, Clone)]
pub struct Deployments {
    http: HttpClient,
}

impl Deployments {
    pub(crate) fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn list(&self) -> Result<Vec<Deployment>> {
        self.http.get(&format!("{DEPLOYMENTS_PATH}/")).await
    }

    pub async fn get(&self, deployment_id: &str) -> Result<Deployment> {
        self.http
            .get(&format!("{DEPLOYMENTS_PATH}/{deployment_id}"))
            .await
    }

    pub async fn create(&self, request: &CreateDeploymentRequest) -> Result<Deployment> {
        let deployment: Deployment = self
            .http
            .post(&format!("{DEPLOYMENTS_PATH}/create/"), request)
            .await?;
        tracing::info!(
            deployment_id = %deployment.id,
            model = %request.model_id,
            status = ?deployment.status,
            "deployment created"
        );
        Ok(deployment)
    }

    pub async fn update(
        &self,
        deployment_id: &str,
        request: &UpdateDeploymentRequest,
    ) -> Result<Deployment> {
        self.http
            .send_json(
                Method::PATCH,
                &format!("{DEPLOYMENTS_PATH}/{deployment_id}"),
                request,
            )
            .await
    }

    pub async fn start(&self, deployment_id: &str) -> Result<Deployment> {
        let deployment: Deployment = self
            .http
            .post_empty(&format!("{DEPLOYMENTS_PATH}/{deployment_id}/start"))
            .await?;
        tracing::info!(deployment_id, status = ?deployment.status, "deployment started");
        Ok(deployment)
    }

    pub async fn stop(&self, deployment_id: &str) -> Result<Deployment> {
        let deployment: Deployment = self
            .http
            .post_empty(&format!("{DEPLOYMENTS_PATH}/{deployment_id}/stop"))
            .await?;
        tracing::info!(deployment_id, status = ?deployment.status, "deployment stopped");
        Ok(deployment)
    }

    pub async fn delete(&self, deployment_id: &str) -> Result<()> {
        self.http
            .delete(&format!("{DEPLOYMENTS_PATH}/{deployment_id}"))
            .await
    }
}

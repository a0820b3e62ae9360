use reqwest::Method;
use vendi_common::{CreatePromptTemplateRequest, PromptTemplate, UpdatePromptTemplateRequest};

use crate::error::Result;
use crate::http::HttpClient;

const TEMPLATES_PATH: &str = "/api/v1/prompt-templates";

#[derive(Debug, Clone)]
pub struct PromptTemplates {
    http: HttpClient,
}

impl PromptTemplates {
    pub(crate) fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn create(&self, request: &CreatePromptTemplateRequest) -> Result<PromptTemplate> {
        request.validate()?;
        let template: PromptTemplate = self
            .http
            .post(&format!("{TEMPLATES_PATH}/create"), request)
            .await?;
        tracing::info!(template_id = %template.id, name = %template.name, "prompt template created");
        Ok(template)
    }

    pub async fn get(&self, template_id: &str) -> Result<PromptTemplate> {
        self.http
            .get(&format!("{TEMPLATES_PATH}/{template_id}"))
            .await
    }

    pub async fn list(&self) -> Result<Vec<PromptTemplate>> {
        self.http.get(&format!("{TEMPLATES_PATH}/")).await
    }

    pub async fn update(
        &self,
        template_id: &str,
        request: &UpdatePromptTemplateRequest,
    ) -> Result<PromptTemplate> {
        request.validate()?;
        self.http
            .send_json(
                Method::PATCH,
                &format!("{TEMPLATES_PATH}/{template_id}"),
                request,
            )
            .await
    }

    pub async fn delete(&self, template_id: &str) -> Result<()> {
        self.http
            .delete(&format!("{TEMPLATES_PATH}/{template_id}"))
            .await
    }
}

use serde_json::Value;
use vendi_common::dataset::to_json_lines;
use vendi_common::{Dataset, DownloadLink};

use crate::error::{Result, VendiError};
use crate::http::HttpClient;

const DATASETS_PATH: &str = "/api/v1/datasets";

#[derive(Debug, Clone)]
pub struct Datasets {
    http: HttpClient,
}

impl Datasets {
    pub(crate) fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Upload `rows` as a JSON-lines dataset called `name`.
    pub async fn upload(&self, name: &str, rows: &[Value]) -> Result<Dataset> {
        if name.trim().is_empty() {
            return Err(VendiError::Validation(vendi_common::ValidationError::InvalidField {
                field: "name",
                reason: "dataset name is empty".to_string(),
            }));
        }
        let body = to_json_lines(rows)?;
        let dataset: Dataset = self
            .http
            .post_text(DATASETS_PATH, &[("name", name)], "application/x-ndjson", body)
            .await?;
        tracing::info!(dataset_id = %dataset.id, name, rows = rows.len(), "dataset uploaded");
        Ok(dataset)
    }

    pub async fn get(&self, dataset_id: &str) -> Result<Dataset> {
        self.http.get(&format!("{DATASETS_PATH}/{dataset_id}")).await
    }

    pub async fn list(&self) -> Result<Vec<Dataset>> {
        self.http.get(DATASETS_PATH).await
    }

    pub async fn delete(&self, dataset_id: &str) -> Result<()> {
        self.http
            .delete(&format!("{DATASETS_PATH}/{dataset_id}"))
            .await?;
        tracing::info!(dataset_id, "dataset deleted");
        Ok(())
    }

    pub async fn download_link(&self, dataset_id: &str) -> Result<DownloadLink> {
        self.http
            .get(&format!("{DATASETS_PATH}/{dataset_id}/download-link"))
            .await
    }
}

use std::collections::HashMap;

use vendi_common::{split_model_id, ModelInfo, ValidationError};

use crate::error::{Result, VendiError};
use crate::http::HttpClient;

#[derive(Debug, Clone)]
pub struct Models {
    http: HttpClient,
}

impl Models {
    pub(crate) fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Models offered by `provider`. The platform wraps them as `{ provider: [...] }`.
    pub async fn list(&self, provider: &str) -> Result<Vec<ModelInfo>> {
        let mut by_provider: HashMap<String, Vec<ModelInfo>> = self
            .http
            .get(&format!("/api/v1/providers/{provider}/models"))
            .await?;
        by_provider.remove(provider).ok_or_else(|| {
            VendiError::Decode(format!("models response has no `{provider}` entry"))
        })
    }

    /// Look up a `<provider>/<model>` identifier in its provider's listing.
    pub async fn find(&self, model: &str) -> Result<Option<ModelInfo>> {
        let (provider, id) = split_model_id(model).ok_or_else(|| ValidationError::InvalidField {
            field: "model",
            reason: format!("`{model}` is not of the form <provider>/<model>"),
        })?;
        let models = self.list(provider).await?;
        Ok(models.into_iter().find(|m| m.id == id))
    }
}

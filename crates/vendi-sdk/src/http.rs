//! Authenticated JSON transport shared by every resource.
//!
//! Both clients attach `Authorization: Bearer` and, when configured,
//! `X-Project-Id`. Non-2xx responses become [`TransportError`] with the
//! server body preserved; nothing is retried.

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use vendi_instrument::PROJECT_ID_HEADER;

use crate::config::VendiConfig;
use crate::error::{Result, TransportError, VendiError};

fn decode<T: DeserializeOwned>(url: &str, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| VendiError::Decode(format!("{url}: {e}")))
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    project_id: Option<String>,
}

impl HttpClient {
    pub fn new(config: &VendiConfig) -> Result<Self> {
        let base_url = config.validate()?;
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| VendiError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone().unwrap_or_default(),
            project_id: config.project_id.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url).bearer_auth(&self.api_key);
        match &self.project_id {
            Some(p) => builder.header(PROJECT_ID_HEADER, p),
            None => builder,
        }
    }

    async fn execute(&self, builder: reqwest::RequestBuilder, url: &str) -> Result<String> {
        let resp = builder
            .send()
            .await
            .map_err(|e| TransportError::connection(url, e))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| TransportError::connection(url, e))?;
        if !status.is_success() {
            tracing::debug!(url, status = status.as_u16(), "request failed");
            return Err(TransportError::status(url, status.as_u16(), body).into());
        }
        Ok(body)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        let body = self.execute(self.request(Method::GET, &url), &url).await?;
        decode(&url, &body)
    }

    pub async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.url(path);
        let resp = self
            .execute(self.request(method, &url).json(body), &url)
            .await?;
        decode(&url, &resp)
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send_json(Method::POST, path, body).await
    }

    /// POST without a body, e.g. lifecycle actions.
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        let body = self.execute(self.request(Method::POST, &url), &url).await?;
        decode(&url, &body)
    }

    /// POST a raw text body with query parameters.
    pub async fn post_text<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        content_type: &str,
        body: String,
    ) -> Result<T> {
        let url = self.url(path);
        let builder = self
            .request(Method::POST, &url)
            .query(query)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body);
        let resp = self.execute(builder, &url).await?;
        decode(&url, &resp)
    }

    /// DELETE; the response body, if any, is ignored.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let url = self.url(path);
        self.execute(self.request(Method::DELETE, &url), &url)
            .await
            .map(|_| ())
    }
}

/// Blocking counterpart of [`HttpClient`].
///
/// Must not be created or dropped from inside an async context.
#[derive(Debug, Clone)]
pub struct BlockingHttpClient {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    project_id: Option<String>,
}

impl BlockingHttpClient {
    pub fn new(config: &VendiConfig) -> Result<Self> {
        let base_url = config.validate()?;
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| VendiError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone().unwrap_or_default(),
            project_id: config.project_id.clone(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, method: Method, url: &str) -> reqwest::blocking::RequestBuilder {
        let builder = self.client.request(method, url).bearer_auth(&self.api_key);
        match &self.project_id {
            Some(p) => builder.header(PROJECT_ID_HEADER, p),
            None => builder,
        }
    }

    fn execute(&self, builder: reqwest::blocking::RequestBuilder, url: &str) -> Result<String> {
        let resp = builder
            .send()
            .map_err(|e| TransportError::connection(url, e))?;
        let status = resp.status();
        let body = resp.text().map_err(|e| TransportError::connection(url, e))?;
        if !status.is_success() {
            tracing::debug!(url, status = status.as_u16(), "request failed");
            return Err(TransportError::status(url, status.as_u16(), body).into());
        }
        Ok(body)
    }

    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        let body = self.execute(self.request(Method::GET, &url), &url)?;
        decode(&url, &body)
    }

    pub fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.url(path);
        let resp = self.execute(self.request(Method::POST, &url).json(body), &url)?;
        decode(&url, &resp)
    }
}

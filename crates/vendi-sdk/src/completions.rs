use serde_json::Value;
use tracing::Instrument;
use vendi_common::{ChatMessage, Completion, CompletionRequest, ManyCompletionsRequest};

use crate::error::{Result, VendiError};
use crate::http::{BlockingHttpClient, HttpClient};

const CHAT_PATH: &str = "/api/v1/providers/chat/completions";
const MANY_PATH: &str = "/api/v1/providers/completions-many";

fn decode_one(body: Value, openai_compatible: bool) -> Result<Completion> {
    Completion::from_value(body, openai_compatible).map_err(VendiError::from)
}

fn decode_many(requests: &[CompletionRequest], bodies: Vec<Value>) -> Result<Vec<Completion>> {
    if bodies.len() != requests.len() {
        return Err(VendiError::Decode(format!(
            "expected {} completions, got {}",
            requests.len(),
            bodies.len()
        )));
    }
    requests
        .iter()
        .zip(bodies)
        .map(|(req, body)| decode_one(body, req.openai_compatible))
        .collect()
}

/// One prompt fanned out to several models.
fn fan_out_models(template: &CompletionRequest, models: &[String]) -> Vec<CompletionRequest> {
    models.iter().map(|m| template.for_model(m.clone())).collect()
}

/// Several prompts against the template's model.
fn fan_out_prompts(
    template: &CompletionRequest,
    prompts: Vec<Vec<ChatMessage>>,
) -> Vec<CompletionRequest> {
    prompts
        .into_iter()
        .map(|messages| CompletionRequest {
            messages,
            ..template.clone()
        })
        .collect()
}

fn validate_all(requests: &[CompletionRequest]) -> Result<()> {
    if requests.is_empty() {
        return Err(VendiError::Validation(vendi_common::ValidationError::EmptyMessages));
    }
    for req in requests {
        req.validate()?;
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct Completions {
    http: HttpClient,
}

impl Completions {
    pub(crate) fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Validated locally first; an invalid request never reaches the network.
    pub async fn create(&self, request: &CompletionRequest) -> Result<Completion> {
        request.validate()?;
        let span = tracing::info_span!(
            "vendi.completion",
            model = %request.model,
            openai_compatible = request.openai_compatible
        );
        async {
            let body: Value = self.http.post(CHAT_PATH, request).await?;
            let completion = decode_one(body, request.openai_compatible)?;
            tracing::debug!(completion_id = completion.id(), "completion received");
            Ok(completion)
        }
        .instrument(span)
        .await
    }

    /// Run `template` against every model in `models`, results in the same order.
    pub async fn create_many(
        &self,
        template: &CompletionRequest,
        models: &[String],
    ) -> Result<Vec<Completion>> {
        self.send_many(fan_out_models(template, models)).await
    }

    /// Run each prompt in `prompts` with the template's model and sampling parameters.
    pub async fn create_batch(
        &self,
        template: &CompletionRequest,
        prompts: Vec<Vec<ChatMessage>>,
    ) -> Result<Vec<Completion>> {
        self.send_many(fan_out_prompts(template, prompts)).await
    }

    async fn send_many(&self, requests: Vec<CompletionRequest>) -> Result<Vec<Completion>> {
        validate_all(&requests)?;
        let span = tracing::info_span!("vendi.completion.many", requests = requests.len());
        async {
            let body = ManyCompletionsRequest { requests };
            let bodies: Vec<Value> = self.http.post(MANY_PATH, &body).await?;
            decode_many(&body.requests, bodies)
        }
        .instrument(span)
        .await
    }
}

#[derive(Debug, Clone)]
pub struct BlockingCompletions {
    http: BlockingHttpClient,
}

impl BlockingCompletions {
    pub(crate) fn new(http: BlockingHttpClient) -> Self {
        Self { http }
    }

    pub fn create(&self, request: &CompletionRequest) -> Result<Completion> {
        request.validate()?;
        let _span = tracing::info_span!(
            "vendi.completion",
            model = %request.model,
            openai_compatible = request.openai_compatible
        )
        .entered();
        let body: Value = self.http.post(CHAT_PATH, request)?;
        decode_one(body, request.openai_compatible)
    }

    pub fn create_many(
        &self,
        template: &CompletionRequest,
        models: &[String],
    ) -> Result<Vec<Completion>> {
        self.send_many(fan_out_models(template, models))
    }

    pub fn create_batch(
        &self,
        template: &CompletionRequest,
        prompts: Vec<Vec<ChatMessage>>,
    ) -> Result<Vec<Completion>> {
        self.send_many(fan_out_prompts(template, prompts))
    }

    fn send_many(&self, requests: Vec<CompletionRequest>) -> Result<Vec<Completion>> {
        validate_all(&requests)?;
        let _span = tracing::info_span!("vendi.completion.many", requests = requests.len()).entered();
        let body = ManyCompletionsRequest { requests };
        let bodies: Vec<Value> = self.http.post(MANY_PATH, &body)?;
        decode_many(&body.requests, bodies)
    }
}

mod common;

use std::sync::{Arc, Mutex};

use common::{client_config, rows, stub_config};
use futures_util::future::join_all;
use serde_json::{Map, Value};
use tracing::span::{Attributes, Id};
use tracing::Subscriber;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use vendi_sdk::instrument::{self, Workflow, WorkflowLayer, WorkflowsAttribute};
use vendi_sdk::{ChatMessage, CompletionRequest, ModelParameters, Vendi};

#[derive(Clone, Default)]
struct Spans(Arc<Mutex<Vec<(String, Option<Map<String, Value>>)>>>);

impl<S> Layer<S> for Spans
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let workflows = span
            .extensions()
            .get::<WorkflowsAttribute>()
            .and_then(|a| a.parse());
        self.0
            .lock()
            .unwrap()
            .push((attrs.metadata().name().to_string(), workflows));
    }
}

impl Spans {
    fn named(&self, name: &str) -> Vec<Option<Map<String, Value>>> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, w)| w.clone())
            .collect()
    }
}

fn request(text: &str) -> CompletionRequest {
    CompletionRequest::new("openai/gpt-4", vec![ChatMessage::user(text)])
}

#[tokio::test]
async fn test_completion_span_carries_active_workflows() {
    let spans = Spans::default();
    let subscriber = tracing_subscriber::registry()
        .with(WorkflowLayer::new())
        .with(spans.clone());
    let _default = tracing::subscriber::set_default(subscriber);

    let stub = vendi_stub::spawn(stub_config()).await.unwrap();
    let vendi = Vendi::new(client_config(&stub)).unwrap();

    Workflow::new("pipeline")
        .run_id("run-1")
        .tag("team", "search")
        .run(async {
            Workflow::new("summarize")
                .run(async {
                    instrument::set_tag("doc", 42).unwrap();
                    vendi.completions().create(&request("hi")).await.unwrap();
                })
                .await;
        })
        .await;
    vendi.completions().create(&request("outside")).await.unwrap();

    let completions = spans.named("vendi.completion");
    assert_eq!(completions.len(), 2);

    let inside = completions[0].as_ref().expect("span inside workflow is tagged");
    assert_eq!(inside["pipeline"]["run_id"], "run-1");
    assert_eq!(inside["pipeline"]["tags"]["team"], "search");
    assert_eq!(inside["summarize"]["tags"]["doc"], 42);
    assert!(completions[1].is_none());
}

#[tokio::test]
async fn test_global_record_is_always_attached() {
    let spans = Spans::default();
    let config = instrument::InstrumentConfig::default().with_tag("environment", "ci");
    let subscriber = tracing_subscriber::registry()
        .with(config.workflow_layer())
        .with(spans.clone());
    let _default = tracing::subscriber::set_default(subscriber);

    let stub = vendi_stub::spawn(stub_config()).await.unwrap();
    let dataset = stub.state.insert_dataset("questions", rows());
    let vendi = Vendi::new(client_config(&stub)).unwrap();

    vendi
        .batch()
        .submit(&dataset.id, vec![ModelParameters::new("openai/gpt-4")])
        .await
        .unwrap();

    let submits = spans.named("vendi.batch.submit");
    let attached = submits[0].as_ref().unwrap();
    assert_eq!(attached.len(), 1);
    assert_eq!(attached[instrument::GLOBAL_WORKFLOW]["tags"]["environment"], "ci");
}

#[tokio::test]
async fn test_concurrent_workflows_tag_their_own_requests() {
    let spans = Spans::default();
    let subscriber = tracing_subscriber::registry()
        .with(WorkflowLayer::new())
        .with(spans.clone());
    let _default = tracing::subscriber::set_default(subscriber);

    let stub = vendi_stub::spawn(stub_config()).await.unwrap();
    let vendi = Vendi::new(client_config(&stub)).unwrap();

    let runs = (0..5).map(|i| {
        let vendi = vendi.clone();
        Workflow::new("task").run_id(format!("run-{i}")).run(async move {
            let text = format!("prompt {i}");
            let completion = vendi.completions().create(&request(&text)).await.unwrap();
            (
                instrument::current().unwrap().run_id,
                completion.text().map(str::to_string),
            )
        })
    });
    let results = join_all(runs).await;

    for (i, (run_id, text)) in results.into_iter().enumerate() {
        assert_eq!(run_id, format!("run-{i}"));
        assert_eq!(text.as_deref(), Some(format!("echo: prompt {i}").as_str()));
    }

    let mut tagged: Vec<String> = spans
        .named("vendi.completion")
        .into_iter()
        .map(|w| w.unwrap()["task"]["run_id"].as_str().unwrap().to_string())
        .collect();
    tagged.sort();
    assert_eq!(tagged, (0..5).map(|i| format!("run-{i}")).collect::<Vec<_>>());
}

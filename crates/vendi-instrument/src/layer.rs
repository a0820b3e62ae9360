use opentelemetry::KeyValue;
use serde_json::{Map, Value};
use tracing::span::{Attributes, Id};
use tracing::Subscriber;
use tracing_opentelemetry::OtelData;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::{LookupSpan, Registry};

use crate::context::{self, Tags, WorkflowContext, GLOBAL_WORKFLOW, WORKFLOWS_KEY};

/// JSON-encoded workflow stack stored on every span created while a workflow
/// (or the global record) is active.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowsAttribute(pub String);

impl WorkflowsAttribute {
    pub fn parse(&self) -> Option<Map<String, Value>> {
        match serde_json::from_str(&self.0) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        }
    }
}

/// Stamps new spans with the caller's workflow stack.
///
/// Must sit above the `tracing_opentelemetry` layer so that `OtelData` already
/// exists when this layer sees the span.
#[derive(Debug, Clone, Default)]
pub struct WorkflowLayer {
    global: Option<WorkflowContext>,
}

impl WorkflowLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize `tags` as the `_global` record ahead of the ambient stack.
    pub fn with_global_tags(mut self, tags: Tags) -> Self {
        if tags.is_empty() {
            self.global = None;
        } else {
            self.global = Some(WorkflowContext::new(GLOBAL_WORKFLOW).with_tags(tags));
        }
        self
    }

    pub fn global(&self) -> Option<&WorkflowContext> {
        self.global.as_ref()
    }

    /// The `workflows` attribute value for the calling task, or `None` when there is nothing to attach.
    pub fn render(&self) -> Option<String> {
        let mut map = Map::new();
        if let Some(global) = &self.global {
            if let Ok(v) = serde_json::to_value(global) {
                map.insert(global.name.clone(), v);
            }
        }
        map.extend(context::snapshot().to_attribute_map());
        if map.is_empty() {
            return None;
        }
        serde_json::to_string(&map).ok()
    }
}

impl<S> Layer<S> for WorkflowLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, _attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(json) = self.render() else {
            return;
        };
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        if let Some(otel) = extensions.get_mut::<OtelData>() {
            otel.builder
                .attributes
                .get_or_insert_with(Vec::new)
                .push(KeyValue::new(WORKFLOWS_KEY, json.clone()));
        }
        extensions.insert(WorkflowsAttribute(json));
    }
}

/// Refresh the `workflows` attribute on the current span and its ancestors.
///
/// Records already named in a span's attribute are overwritten with their
/// current value from the caller's stack; records the span never carried are
/// not added. Only works when the subscriber is built on a [`Registry`].
pub(crate) fn restamp_current_span() {
    let stack = context::snapshot().to_attribute_map();
    if stack.is_empty() {
        return;
    }
    tracing::Span::current().with_subscriber(|(id, dispatch)| {
        let Some(registry) = dispatch.downcast_ref::<Registry>() else {
            return;
        };
        let Some(current) = registry.span(id) else {
            return;
        };
        for span in current.scope() {
            let mut extensions = span.extensions_mut();
            let Some(mut map) = extensions.get_mut::<WorkflowsAttribute>().and_then(|a| a.parse())
            else {
                continue;
            };
            let mut changed = false;
            for (name, record) in &stack {
                if let Some(slot) = map.get_mut(name) {
                    if slot != record {
                        *slot = record.clone();
                        changed = true;
                    }
                }
            }
            if !changed {
                continue;
            }
            let Ok(json) = serde_json::to_string(&map) else {
                continue;
            };
            if let Some(attributes) = extensions
                .get_mut::<OtelData>()
                .and_then(|otel| otel.builder.attributes.as_mut())
            {
                for kv in attributes.iter_mut().filter(|kv| kv.key.as_str() == WORKFLOWS_KEY) {
                    kv.value = opentelemetry::Value::from(json.clone());
                }
            }
            extensions.replace(WorkflowsAttribute(json));
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::Workflow;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Clone, Default)]
    struct Captured {
        spans: Arc<Mutex<Vec<(String, Option<String>, Option<String>)>>>,
        closed: Arc<Mutex<Vec<Option<String>>>>,
    }

    // Records (span name, extension value, otel attribute value).
    impl<S> Layer<S> for Captured
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
            let Some(span) = ctx.span(id) else { return };
            let ext = span.extensions();
            let attribute = ext.get::<WorkflowsAttribute>().map(|a| a.0.clone());
            let otel = ext.get::<OtelData>().and_then(|d| {
                d.builder.attributes.as_ref().and_then(|attrs| {
                    attrs
                        .iter()
                        .find(|kv| kv.key.as_str() == WORKFLOWS_KEY)
                        .map(|kv| kv.value.as_str().to_string())
                })
            });
            self.spans
                .lock()
                .unwrap()
                .push((attrs.metadata().name().to_string(), attribute, otel));
        }

        fn on_close(&self, id: Id, ctx: Context<'_, S>) {
            let Some(span) = ctx.span(&id) else { return };
            let attribute = span.extensions().get::<WorkflowsAttribute>().map(|a| a.0.clone());
            self.closed.lock().unwrap().push(attribute);
        }
    }

    fn current_otel_workflows() -> Option<String> {
        tracing::Span::current()
            .with_subscriber(|(id, dispatch)| {
                let span = dispatch.downcast_ref::<Registry>()?.span(id)?;
                let ext = span.extensions();
                let value = ext
                    .get::<OtelData>()?
                    .builder
                    .attributes
                    .as_ref()?
                    .iter()
                    .find(|kv| kv.key.as_str() == WORKFLOWS_KEY)
                    .map(|kv| kv.value.as_str().to_string());
                value
            })
            .flatten()
    }

    fn global_tags() -> Tags {
        match json!({"environment": "test", "project_id": "p-1"}) {
            Value::Object(m) => m,
            _ => Tags::new(),
        }
    }

    #[test]
    fn test_render_empty_without_workflows() {
        std::thread::spawn(|| {
            assert_eq!(WorkflowLayer::new().render(), None);
            assert_eq!(WorkflowLayer::new().with_global_tags(Tags::new()).render(), None);
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_layer_stamps_extension_and_otel_attribute() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::registry()
            .with(tracing_opentelemetry::layer())
            .with(WorkflowLayer::new().with_global_tags(global_tags()))
            .with(captured.clone());

        tracing::subscriber::with_default(subscriber, || {
            Workflow::new("outer").run_id("o-1").run_sync(|| {
                Workflow::new("inner").tag("step", 1).run_sync(|| {
                    let _span = tracing::info_span!("vendi.step").entered();
                });
            });
            let _outside = tracing::info_span!("vendi.outside").entered();
        });

        let spans = captured.spans.lock().unwrap();
        let step = spans.iter().find(|(name, ..)| name == "vendi.step").unwrap();
        let map: Map<String, Value> = serde_json::from_str(step.1.as_deref().unwrap()).unwrap();
        assert_eq!(map["_global"]["tags"]["environment"], "test");
        assert_eq!(map["outer"]["run_id"], "o-1");
        assert_eq!(map["inner"]["tags"]["step"], 1);
        assert_eq!(step.1, step.2);

        // Only the global record remains once the workflows exit.
        let outside = spans.iter().find(|(name, ..)| name == "vendi.outside").unwrap();
        let map = WorkflowsAttribute(outside.1.clone().unwrap()).parse().unwrap();
        assert_eq!(map.len(), 1);
        assert!(map.contains_key(GLOBAL_WORKFLOW));
    }

    #[test]
    fn test_no_attribute_without_workflows_or_global() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::registry()
            .with(WorkflowLayer::new())
            .with(captured.clone());
        std::thread::spawn(move || {
            tracing::subscriber::with_default(subscriber, || {
                let _span = tracing::info_span!("bare").entered();
            });
        })
        .join()
        .unwrap();
        let spans = captured.spans.lock().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].1, None);
        assert_eq!(spans[0].2, None);
    }

    #[test]
    fn test_mutations_restamp_the_open_span() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::registry()
            .with(tracing_opentelemetry::layer())
            .with(WorkflowLayer::new())
            .with(captured.clone());

        let during = tracing::subscriber::with_default(subscriber, || {
            Workflow::new("outer").run_id("o-1").run_sync(|| {
                Workflow::new("chat").run_id("initial").run_sync(|| {
                    context::set_run_id("from-body").unwrap();
                    context::set_tag("user", "u1").unwrap();
                    current_otel_workflows()
                })
            })
        });

        let closed = captured.closed.lock().unwrap();
        let maps: Vec<Map<String, Value>> = closed
            .iter()
            .map(|a| serde_json::from_str(a.as_deref().unwrap()).unwrap())
            .collect();
        let chat = maps.iter().find(|m| m.contains_key("chat")).unwrap();
        assert_eq!(chat["chat"]["run_id"], "from-body");
        assert_eq!(chat["chat"]["tags"]["user"], "u1");
        assert_eq!(chat["outer"]["run_id"], "o-1");

        // Enclosing spans never gain records they did not carry.
        let outer = maps.iter().find(|m| !m.contains_key("chat")).unwrap();
        assert_eq!(outer.len(), 1);

        let otel: Map<String, Value> = serde_json::from_str(&during.unwrap()).unwrap();
        assert_eq!(&otel, chat);
    }

    #[test]
    fn test_guard_mutations_restamp_the_open_span() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::registry()
            .with(WorkflowLayer::new())
            .with(captured.clone());
        std::thread::spawn(move || {
            tracing::subscriber::with_default(subscriber, || {
                let guard = Workflow::new("session").enter();
                guard.set_run_id("s-2").unwrap();
                guard.merge_tags(global_tags()).unwrap();
            });
        })
        .join()
        .unwrap();

        let closed = captured.closed.lock().unwrap();
        assert_eq!(closed.len(), 1);
        let map = WorkflowsAttribute(closed[0].clone().unwrap()).parse().unwrap();
        assert_eq!(map["session"]["run_id"], "s-2");
        assert_eq!(map["session"]["tags"]["project_id"], "p-1");
    }
}

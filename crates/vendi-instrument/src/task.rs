use std::fmt;
use std::future::Future;

use tracing::{Instrument, Span};

/// Kind of unit a span stands for, reported as `traceloop.span.kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    Workflow,
    Task,
    Agent,
    Tool,
}

impl SpanKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SpanKind::Workflow => "workflow",
            SpanKind::Task => "task",
            SpanKind::Agent => "agent",
            SpanKind::Tool => "tool",
        }
    }
}

impl fmt::Display for SpanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn workflow_span(name: &str, run_id: &str) -> Span {
    tracing::info_span!(
        "workflow",
        otel.name = %format!("{name}.{}", SpanKind::Workflow),
        traceloop.span.kind = SpanKind::Workflow.as_str(),
        traceloop.entity.name = %name,
        workflow.name = %name,
        workflow.run_id = %run_id,
    )
}

/// A named step inside a workflow.
///
/// Tasks only open a span; they never touch the workflow stack, so the span
/// inherits the `workflows` attribute of whatever is active around it.
#[derive(Debug, Clone)]
pub struct Task {
    name: String,
    kind: SpanKind,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SpanKind::Task,
        }
    }

    pub fn agent(name: impl Into<String>) -> Self {
        Self::new(name).kind(SpanKind::Agent)
    }

    pub fn tool(name: impl Into<String>) -> Self {
        Self::new(name).kind(SpanKind::Tool)
    }

    pub fn kind(mut self, kind: SpanKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The span `run` and `run_sync` open, named `<name>.<kind>` for exporters.
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "task",
            otel.name = %format!("{}.{}", self.name, self.kind),
            traceloop.span.kind = self.kind.as_str(),
            traceloop.entity.name = %self.name,
        )
    }

    /// The span is opened on first poll, inside whatever workflow scope the
    /// returned future ends up running in.
    pub fn run<F: Future>(self, fut: F) -> impl Future<Output = F::Output> {
        async move { fut.instrument(self.span()).await }
    }

    pub fn run_sync<R>(self, f: impl FnOnce() -> R) -> R {
        let _span = self.span().entered();
        f()
    }
}

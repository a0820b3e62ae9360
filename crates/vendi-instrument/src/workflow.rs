use std::future::Future;
use std::marker::PhantomData;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::context::{self, Tags, WorkflowContext};
use crate::error::ContextError;
use crate::task::workflow_span;

/// Push a workflow onto the caller's stack. The returned guard exits it on drop.
///
/// The guard is `!Send`: on the thread fallback a guard held across an
/// `.await` could resume on another worker and pop the wrong stack. Use
/// [`Workflow::run`] for async code.
pub fn enter(name: impl Into<String>, run_id: Option<String>, tags: Option<Tags>) -> WorkflowGuard {
    let mut workflow = Workflow::new(name);
    if let Some(run_id) = run_id {
        workflow = workflow.run_id(run_id);
    }
    if let Some(tags) = tags {
        workflow = workflow.tags(tags);
    }
    workflow.enter()
}

/// Builder for a workflow record.
#[derive(Debug, Clone)]
pub struct Workflow {
    context: WorkflowContext,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            context: WorkflowContext::new(name),
        }
    }

    pub fn run_id(mut self, run_id: impl Into<String>) -> Self {
        self.context.run_id = run_id.into();
        self
    }

    pub fn tags(mut self, tags: Tags) -> Self {
        self.context.merge_tags(tags);
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.tags.insert(key.into(), value.into());
        self
    }

    pub fn context(&self) -> &WorkflowContext {
        &self.context
    }

    pub fn enter(self) -> WorkflowGuard {
        let name = self.context.name.clone();
        let run_id = self.context.run_id.clone();
        context::push(self.context);
        let span = workflow_span(&name, &run_id).entered();
        tracing::debug!(workflow = %name, run_id = %run_id, "workflow entered");
        WorkflowGuard {
            name,
            armed: true,
            _span: span,
            _not_send: PhantomData,
        }
    }

    /// Run `fut` with this workflow pushed on a copy of the caller's stack.
    ///
    /// The copy is taken when `run` is called. Changes made inside `fut` are
    /// dropped with the scope and never reach the caller.
    pub fn run<F: Future>(self, fut: F) -> impl Future<Output = F::Output> {
        let mut stack = context::snapshot();
        let name = self.context.name.clone();
        let run_id = self.context.run_id.clone();
        stack.push(self.context);
        stack.scope(async move {
            fut.instrument(workflow_span(&name, &run_id)).await
        })
    }

    /// Synchronous counterpart of [`Workflow::run`].
    pub fn run_sync<R>(self, f: impl FnOnce() -> R) -> R {
        let mut stack = context::snapshot();
        let name = self.context.name.clone();
        let run_id = self.context.run_id.clone();
        stack.push(self.context);
        stack.sync_scope(|| {
            let _span = workflow_span(&name, &run_id).entered();
            f()
        })
    }
}

/// Active workflow on the caller's stack.
#[must_use = "the workflow exits as soon as the guard is dropped"]
pub struct WorkflowGuard {
    name: String,
    armed: bool,
    _span: tracing::span::EnteredSpan,
    _not_send: PhantomData<*const ()>,
}

impl WorkflowGuard {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The record as it currently sits on the stack.
    pub fn context(&self) -> Result<WorkflowContext, ContextError> {
        context::get_named(&self.name).ok_or_else(|| ContextError::NotActive(self.name.clone()))
    }

    pub fn set_run_id(&self, run_id: impl Into<String>) -> Result<(), ContextError> {
        let run_id = run_id.into();
        context::update_named(&self.name, |ctx| ctx.run_id = run_id)
    }

    pub fn merge_tags(&self, updates: Tags) -> Result<(), ContextError> {
        context::update_named(&self.name, |ctx| ctx.merge_tags(updates))
    }

    /// Exit now and report a misuse instead of logging it.
    pub fn exit(mut self) -> Result<WorkflowContext, ContextError> {
        self.armed = false;
        context::exit(&self.name)
    }
}

impl Drop for WorkflowGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = context::exit(&self.name) {
            tracing::warn!(workflow = %self.name, error = %e, "failed to exit workflow");
        }
    }
}

impl std::fmt::Debug for WorkflowGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowGuard").field("name", &self.name).finish()
    }
}

/// `tokio::spawn` that carries a snapshot of the caller's stack into the new task.
pub fn spawn<F>(fut: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(context::scope(fut))
}

/// `tokio::task::spawn_blocking` that carries a snapshot of the caller's stack.
pub fn spawn_blocking<F, R>(f: F) -> JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let stack = context::snapshot();
    tokio::task::spawn_blocking(move || stack.sync_scope(f))
}

/// `std::thread::spawn` that starts the thread with a copy of the caller's stack.
pub fn spawn_thread<F, R>(f: F) -> std::thread::JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let stack = context::snapshot();
    std::thread::spawn(move || stack.sync_scope(f))
}

//! Ambient workflow stack.
//!
//! Every logical task sees its own [`WorkflowStack`]. Inside a
//! [`WorkflowStack::scope`] (or anything built on it: `Workflow::run`,
//! [`crate::spawn`]) the stack is a tokio task-local, so tokio swaps it in and
//! out around every suspension point and interleaved tasks never observe each
//! other. Outside any scope the stack falls back to a thread-local, which gives
//! plain OS threads independent stacks.

use std::cell::RefCell;
use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::task::futures::TaskLocalFuture;
use uuid::Uuid;

use crate::error::{ContextError, ContextLookupError};
use crate::layer;

pub type Tags = Map<String, Value>;

/// Name of the process-wide record built from the instrument configuration.
pub const GLOBAL_WORKFLOW: &str = "_global";

/// Span attribute carrying the JSON-encoded workflow stack.
pub const WORKFLOWS_KEY: &str = "workflows";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowContext {
    pub name: String,
    pub run_id: String,
    #[serde(default)]
    pub tags: Tags,
}

impl WorkflowContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            run_id: new_run_id(),
            tags: Tags::new(),
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.merge_tags(tags);
        self
    }

    /// Last write wins per key; keys not in `updates` are kept.
    pub fn merge_tags(&mut self, updates: Tags) {
        for (k, v) in updates {
            self.tags.insert(k, v);
        }
    }
}

/// 128-bit random correlation token.
pub fn new_run_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowStack {
    entries: Vec<WorkflowContext>,
}

impl WorkflowStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, context: WorkflowContext) {
        self.entries.push(context);
    }

    /// Remove the innermost entry called `name`, wherever it sits in the stack.
    pub fn remove(&mut self, name: &str) -> Option<WorkflowContext> {
        let pos = self.entries.iter().rposition(|c| c.name == name)?;
        Some(self.entries.remove(pos))
    }

    pub fn top(&self) -> Option<&WorkflowContext> {
        self.entries.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut WorkflowContext> {
        self.entries.last_mut()
    }

    pub fn get(&self, name: &str) -> Option<&WorkflowContext> {
        self.entries.iter().rev().find(|c| c.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut WorkflowContext> {
        self.entries.iter_mut().rev().find(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Outermost first.
    pub fn iter(&self) -> impl Iterator<Item = &WorkflowContext> {
        self.entries.iter()
    }

    /// `{ name: {name, run_id, tags} }`; inner entries overwrite outer ones with the same name.
    pub fn to_attribute_map(&self) -> Map<String, Value> {
        let mut out = Map::new();
        for ctx in &self.entries {
            if let Ok(v) = serde_json::to_value(ctx) {
                out.insert(ctx.name.clone(), v);
            }
        }
        out
    }

    /// Run `fut` with this stack as its ambient stack.
    pub fn scope<F: Future>(self, fut: F) -> TaskLocalFuture<RefCell<WorkflowStack>, F> {
        TASK_STACK.scope(RefCell::new(self), fut)
    }

    /// Run `f` on the current thread with this stack as its ambient stack.
    pub fn sync_scope<R>(self, f: impl FnOnce() -> R) -> R {
        TASK_STACK.sync_scope(RefCell::new(self), f)
    }
}

tokio::task_local! {
    static TASK_STACK: RefCell<WorkflowStack>;
}

thread_local! {
    static THREAD_STACK: RefCell<WorkflowStack> = RefCell::new(WorkflowStack::new());
}

fn with_stack<R>(f: impl FnOnce(&mut WorkflowStack) -> R) -> R {
    if is_task_scoped() {
        TASK_STACK.with(|cell| f(&mut cell.borrow_mut()))
    } else {
        THREAD_STACK.with(|cell| f(&mut cell.borrow_mut()))
    }
}

/// Whether the caller runs inside a task-local scope rather than on the thread fallback.
pub fn is_task_scoped() -> bool {
    TASK_STACK.try_with(|_| ()).is_ok()
}

/// Independent copy of the caller's stack.
pub fn snapshot() -> WorkflowStack {
    with_stack(|s| s.clone())
}

/// Run `fut` with an isolated copy of the caller's stack.
pub fn scope<F: Future>(fut: F) -> TaskLocalFuture<RefCell<WorkflowStack>, F> {
    snapshot().scope(fut)
}

pub(crate) fn push(context: WorkflowContext) {
    with_stack(|s| s.push(context));
}

pub fn exit(name: &str) -> Result<WorkflowContext, ContextError> {
    with_stack(|s| s.remove(name)).ok_or_else(|| ContextError::NotActive(name.to_string()))
}

/// The innermost active workflow.
pub fn current() -> Result<WorkflowContext, ContextLookupError> {
    with_stack(|s| s.top().cloned()).ok_or(ContextLookupError)
}

/// Merge `updates` into the current workflow's tags and return the updated record.
///
/// The current span and its ancestors are re-stamped with the new tags.
pub fn merge_tags(updates: Tags) -> Result<WorkflowContext, ContextLookupError> {
    let updated = with_stack(|s| {
        let top = s.top_mut()?;
        top.merge_tags(updates);
        Some(top.clone())
    })
    .ok_or(ContextLookupError)?;
    layer::restamp_current_span();
    Ok(updated)
}

pub fn set_tag(key: impl Into<String>, value: impl Into<Value>) -> Result<(), ContextLookupError> {
    let mut tags = Tags::new();
    tags.insert(key.into(), value.into());
    merge_tags(tags).map(|_| ())
}

pub fn set_run_id(run_id: impl Into<String>) -> Result<(), ContextLookupError> {
    let run_id = run_id.into();
    with_stack(|s| s.top_mut().map(|top| top.run_id = run_id)).ok_or(ContextLookupError)?;
    layer::restamp_current_span();
    Ok(())
}

pub(crate) fn update_named<R>(
    name: &str,
    f: impl FnOnce(&mut WorkflowContext) -> R,
) -> Result<R, ContextError> {
    let out = with_stack(|s| s.get_mut(name).map(f))
        .ok_or_else(|| ContextError::NotActive(name.to_string()))?;
    layer::restamp_current_span();
    Ok(out)
}

pub(crate) fn get_named(name: &str) -> Option<WorkflowContext> {
    with_stack(|s| s.get(name).cloned())
}

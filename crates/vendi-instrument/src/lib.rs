//! Workflow context propagation for Vendi telemetry.
//!
//! A workflow is a named, tagged unit of work. Active workflows form a stack
//! per logical task, and [`WorkflowLayer`] copies that stack onto every span
//! opened while it is active. [`Task`] marks steps inside a workflow with
//! their own span.

pub mod context;
pub mod error;
pub mod layer;
pub mod task;
pub mod telemetry;
pub mod workflow;

pub use context::{
    current, exit, merge_tags, scope, set_run_id, set_tag, snapshot, Tags,
    WorkflowContext, WorkflowStack, GLOBAL_WORKFLOW, WORKFLOWS_KEY,
};
pub use error::{ContextError, ContextLookupError};
pub use layer::{WorkflowLayer, WorkflowsAttribute};
pub use task::{SpanKind, Task};
pub use telemetry::{init_tracing, InstrumentConfig, PROJECT_ID_HEADER};
pub use workflow::{enter, spawn, spawn_blocking, spawn_thread, Workflow, WorkflowGuard};

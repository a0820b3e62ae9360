pub mod batch_job;
pub mod completion;
pub mod dataset;
pub mod deployment;
pub mod finetune;
pub mod model;
pub mod prompt_template;
pub mod validation;

pub use batch_job::{BatchJob, BatchJobStatus, CreateBatchJobRequest, ModelParameters};
pub use completion::{
    ChatChoice, ChatCompletion, ChatMessage, Completion, CompletionRequest,
    ManyCompletionsRequest, NativeChoice, NativeCompletion, Usage,
};
pub use dataset::{DownloadLink, Dataset};
pub use deployment::{
    Backend, CreateDeploymentRequest, Deployment, DeploymentStatus, ModelConfiguration,
    UpdateDeploymentRequest,
};
pub use finetune::{CreateTrainJobRequest, TrainData, TrainJob, TrainParameters, TrainStatus};
pub use model::{split_model_id, ModelInfo};
pub use prompt_template::{
    CreatePromptTemplateRequest, PromptTemplate, UpdatePromptTemplateRequest,
};
pub use validation::ValidationError;

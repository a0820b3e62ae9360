use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentStatus {
    Live,
    DoesNotExist,
    Error,
    Unknown,
    Stopped,
    /// Transitional; settles into `Stopped`.
    Stopping,
    NotReady,
}

impl DeploymentStatus {
    pub fn is_serving(self) -> bool {
        self == DeploymentStatus::Live
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Pt,
    Ctranslate,
    Vllm,
    Gguf,
}

/// How the model process is launched inside a deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfiguration {
    pub model_name: String,

    #[serde(default)]
    pub backend: Backend,

    /// float16 suits most models; bfloat16 on newer GPUs.
    #[serde(default = "default_dtype")]
    pub dtype: String,

    /// Fraction of GPU memory the engine may claim (0-1).
    #[serde(default = "default_gpu_memory_utilization")]
    pub gpu_memory_utilization: f32,

    #[serde(default = "default_max_model_len")]
    pub max_model_len: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantization: Option<String>,
}

fn default_dtype() -> String {
    "float16".to_string()
}

fn default_gpu_memory_utilization() -> f32 {
    0.8
}

fn default_max_model_len() -> u32 {
    8192
}

impl ModelConfiguration {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            backend: Backend::default(),
            dtype: default_dtype(),
            gpu_memory_utilization: default_gpu_memory_utilization(),
            max_model_len: default_max_model_len(),
            quantization: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Deployment {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    /// vendi / azure / gcp / aws / tenant
    #[serde(default)]
    pub provider: String,
    pub model_configuration: ModelConfiguration,
    #[serde(default = "default_scale_to_zero")]
    pub scale_to_zero: bool,
    #[serde(default = "default_scale_to_zero_timeout")]
    pub scale_to_zero_timeout_seconds: u32,
    pub status: DeploymentStatus,
}

fn default_scale_to_zero() -> bool {
    true
}

fn default_scale_to_zero_timeout() -> u32 {
    900
}

/// Body of `POST /v1/deployments/create/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDeploymentRequest {
    pub name: String,
    pub model_id: String,
    pub model_configuration: ModelConfiguration,
    #[serde(default = "default_scale_to_zero")]
    pub scale_to_zero: bool,
    #[serde(default = "default_scale_to_zero_timeout")]
    pub scale_to_zero_timeout_seconds: u32,
}

impl CreateDeploymentRequest {
    pub fn new(
        name: impl Into<String>,
        model_id: impl Into<String>,
        model_configuration: ModelConfiguration,
    ) -> Self {
        Self {
            name: name.into(),
            model_id: model_id.into(),
            model_configuration,
            scale_to_zero: default_scale_to_zero(),
            scale_to_zero_timeout_seconds: default_scale_to_zero_timeout(),
        }
    }
}

/// Body of `PATCH /v1/deployments/{id}`. Only set fields are changed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDeploymentRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_to_zero: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_to_zero_timeout_seconds: Option<u32>,
}

use crate::batch::{Batches, BlockingBatches, PollPolicy};
use crate::completions::{BlockingCompletions, Completions};
use crate::config::VendiConfig;
use crate::datasets::Datasets;
use crate::deployments::Deployments;
use crate::error::Result;
use crate::finetune::Finetune;
use crate::http::{BlockingHttpClient, HttpClient};
use crate::models::Models;
use crate::prompt_templates::PromptTemplates;

fn default_policy(config: &VendiConfig) -> PollPolicy {
    PollPolicy::new(config.batch_timeout, config.batch_poll_interval)
}

/// Async client for the Vendi platform. Cheap to clone.
///
/// ```no_run
/// # async fn example() -> vendi_sdk::Result<()> {
/// use vendi_sdk::{ChatMessage, CompletionRequest, Vendi};
///
/// let vendi = Vendi::from_env()?;
/// let request = CompletionRequest::new("openai/gpt-4", vec![ChatMessage::user("hi")]);
/// let completion = vendi.completions().create(&request).await?;
/// println!("{:?}", completion.text());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Vendi {
    http: HttpClient,
    poll_defaults: PollPolicy,
}

impl Vendi {
    pub fn new(config: VendiConfig) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(&config)?,
            poll_defaults: default_policy(&config),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(VendiConfig::from_env())
    }

    pub fn batch(&self) -> Batches {
        Batches::new(self.http.clone(), self.poll_defaults)
    }

    pub fn completions(&self) -> Completions {
        Completions::new(self.http.clone())
    }

    pub fn datasets(&self) -> Datasets {
        Datasets::new(self.http.clone())
    }

    pub fn deployments(&self) -> Deployments {
        Deployments::new(self.http.clone())
    }

    pub fn models(&self) -> Models {
        Models::new(self.http.clone())
    }

    pub fn finetune(&self) -> Finetune {
        Finetune::new(self.http.clone())
    }

    pub fn prompt_templates(&self) -> PromptTemplates {
        PromptTemplates::new(self.http.clone())
    }
}

/// Blocking client for batch jobs and completions.
///
/// Backed by `reqwest::blocking`, so it must be used outside of an async
/// runtime (or from `spawn_blocking`).
#[derive(Debug, Clone)]
pub struct BlockingVendi {
    http: BlockingHttpClient,
    poll_defaults: PollPolicy,
}

impl BlockingVendi {
    pub fn new(config: VendiConfig) -> Result<Self> {
        Ok(Self {
            http: BlockingHttpClient::new(&config)?,
            poll_defaults: default_policy(&config),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(VendiConfig::from_env())
    }

    pub fn batch(&self) -> BlockingBatches {
        BlockingBatches::new(self.http.clone(), self.poll_defaults)
    }

    pub fn completions(&self) -> BlockingCompletions {
        BlockingCompletions::new(self.http.clone())
    }
}

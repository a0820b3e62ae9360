use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use vendi_common::{BatchJobStatus, ModelInfo};
use vendi_stub::args::Args;
use vendi_stub::{router, StubConfig, StubState};

fn demo_models() -> Vec<ModelInfo> {
    ["mistralai/Mistral-7B-Instruct-v0.2", "meta-llama/Llama-2-7b-chat-hf"]
        .into_iter()
        .map(|id| ModelInfo {
            id: id.to_string(),
            name: id.rsplit('/').next().unwrap_or(id).to_string(),
            provider: "vendi".to_string(),
            description: None,
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let state = StubState::new(StubConfig {
        api_key: args.api_key,
        polls_until_done: Some(args.polls_until_done),
        final_status: if args.fail_jobs {
            BatchJobStatus::Failed
        } else {
            BatchJobStatus::Completed
        },
    });
    state.insert_models("vendi", demo_models());

    let listener = tokio::net::TcpListener::bind(&args.listen_addr)
        .await
        .with_context(|| format!("bind {}", args.listen_addr))?;
    tracing::info!(addr = %args.listen_addr, polls_until_done = args.polls_until_done, "vendi stub listening");

    axum::serve(listener, router(state)).await.context("serve")?;
    Ok(())
}

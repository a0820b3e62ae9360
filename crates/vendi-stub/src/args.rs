use clap::Parser;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    #[arg(long, env = "VENDI_STUB_ADDR", default_value = "127.0.0.1:8090")]
    pub listen_addr: String,

    /// Bearer token clients must send. Unset accepts any request.
    #[arg(long, env = "VENDI_API_KEY")]
    pub api_key: Option<String>,

    /// Status polls a batch job stays non-terminal before it completes.
    #[arg(long, env = "VENDI_STUB_POLLS_UNTIL_DONE", default_value_t = 3)]
    pub polls_until_done: u32,

    /// Report finished batch jobs as FAILED instead of COMPLETED.
    #[arg(long, env = "VENDI_STUB_FAIL_JOBS", default_value_t = false)]
    pub fail_jobs: bool,
}

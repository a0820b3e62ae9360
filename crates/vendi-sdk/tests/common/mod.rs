#![allow(dead_code)]

use std::time::Duration;

use serde_json::{json, Value};
use vendi_sdk::VendiConfig;
use vendi_stub::{RunningStub, StubConfig};

pub const API_KEY: &str = "test-key";

pub fn stub_config() -> StubConfig {
    StubConfig {
        api_key: Some(API_KEY.to_string()),
        ..StubConfig::default()
    }
}

pub fn client_config(stub: &RunningStub) -> VendiConfig {
    VendiConfig::new(API_KEY)
        .with_base_url(stub.base_url())
        .with_project_id("project-1")
        .with_batch_poll_interval(Duration::from_millis(20))
        .with_batch_timeout(Duration::from_secs(5))
}

pub fn rows() -> Vec<Value> {
    vec![
        json!({"messages": [{"role": "user", "content": "What is 2 + 2?"}]}),
        json!({"messages": [{"role": "user", "content": "Name a colour."}]}),
    ]
}

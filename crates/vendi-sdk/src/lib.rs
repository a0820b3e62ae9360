//! Client SDK for the Vendi LLM platform.
//!
//! [`Vendi`] is the async entry point and [`BlockingVendi`] the blocking one.
//! Workflow tagging lives in [`vendi_instrument`] and is re-exported as
//! [`instrument`].

pub mod batch;
pub mod client;
pub mod completions;
pub mod config;
pub mod datasets;
pub mod deployments;
pub mod error;
pub mod finetune;
pub mod http;
pub mod models;
pub mod prompt_templates;

pub use batch::{PollPolicy, PollSchedule, PollStep};
pub use client::{BlockingVendi, Vendi};
pub use config::VendiConfig;
pub use error::{Result, TransportError, VendiError};
pub use tokio_util::sync::CancellationToken;
pub use vendi_common::*;
pub use vendi_instrument as instrument;

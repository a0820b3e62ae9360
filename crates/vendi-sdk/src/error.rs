//! Error types for the Vendi SDK.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use vendi_common::ValidationError;
use vendi_instrument::{ContextError, ContextLookupError};

pub type Result<T> = std::result::Result<T, VendiError>;

/// A request that did not produce a 2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} {}: {}", outcome(.status), .url, .body)]
pub struct TransportError {
    pub url: String,
    /// `None` when the request never got a response (connect failure, timeout).
    pub status: Option<u16>,
    /// Server body for status errors, the client error message otherwise.
    pub body: String,
}

impl TransportError {
    pub fn status(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: Some(status),
            body: body.into(),
        }
    }

    pub fn connection(url: impl Into<String>, err: impl fmt::Display) -> Self {
        Self {
            url: url.into(),
            status: None,
            body: err.to_string(),
        }
    }
}

fn outcome(status: &Option<u16>) -> String {
    match status {
        Some(status) => format!("HTTP {status} from"),
        None => "request failed for".to_string(),
    }
}

#[derive(Debug, Error)]
pub enum VendiError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The job was still running when the wait budget ran out. The job itself is untouched.
    #[error("batch job {job_id} did not finish within {elapsed:?}")]
    PollTimeout { job_id: String, elapsed: Duration },

    #[error("waiting for batch job {job_id} was cancelled")]
    Cancelled { job_id: String },

    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    ContextLookup(#[from] ContextLookupError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl VendiError {
    /// HTTP status for transport errors that got a response.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            VendiError::Transport(e) => e.status,
            _ => None,
        }
    }

    pub fn is_poll_timeout(&self) -> bool {
        matches!(self, VendiError::PollTimeout { .. })
    }
}

impl From<serde_json::Error> for VendiError {
    fn from(err: serde_json::Error) -> Self {
        VendiError::Decode(err.to_string())
    }
}

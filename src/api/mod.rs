mod http;

use crate::core::models::QueueSnapshot;
use async_trait::async_trait;
use thiserror::Error;

pub use http::HttpAnalysisClient;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("server error: {}", .0.as_deref().unwrap_or("unknown"))]
    Server(Option<String>),

    #[error("response contained no data")]
    MissingData,
}

/// Anything that can report the current state of the analysis queue.
#[async_trait]
pub trait QueueSource: Send + Sync {
    async fn fetch_queue(&self) -> Result<QueueSnapshot, ApiError>;
}

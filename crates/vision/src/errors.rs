use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VisionError {
    /// No token could be acquired before the timeout; retryable
    #[error("rate limit timeout after {0:?}")]
    RateLimited(Duration),

    /// The external call failed (network, auth, bad status)
    #[error("vision model call failed: {0}")]
    CallFailed(String),

    /// Image could not be prepared for the model
    #[error("image processing error: {0}")]
    Image(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

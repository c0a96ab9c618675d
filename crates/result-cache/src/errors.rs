use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization failure: {0}")]
    Serialize(#[from] serde_json::Error),
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiffError {
    /// Image bytes unreadable or corrupt; fatal for the comparison
    #[error("cannot load image: {0}")]
    Load(String),

    /// Encoding or processing failure after a successful load
    #[error("image processing error: {0}")]
    Image(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

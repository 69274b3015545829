use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Setup Failed: {0}")]
    Setup(String),

    #[error("Insufficient Data: {0}")]
    InsufficientData(String),

    #[error("Inference Error: {0}")]
    Inference(String),
}

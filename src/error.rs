use thiserror::Error;

#[derive(Error, Debug)]
pub enum PageGenError {
    #[error("Failed to build request body: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Cannot connect to Ollama at {endpoint}: {message}")]
    Connection { endpoint: String, message: String },

    #[error("Ollama returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Error reading response stream: {0}")]
    StreamRead(String),

    #[error("Generation was cancelled")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, PageGenError>;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrustError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL in flagged link: '{url}'")]
    InvalidUrl { url: String },

    #[error("Malformed compressed spin record: '{raw}'")]
    MalformedSpinRecord { raw: String },

    #[error("Handler '{module_id}' failed: {message}")]
    HandlerFailed { module_id: String, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type TrustResult<T> = Result<T, TrustError>;

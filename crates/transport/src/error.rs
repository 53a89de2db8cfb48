/// Errors raised while talking to a chat backend.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("API error: {0}")]
    Api(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("No API key configured for {0}")]
    MissingApiKey(&'static str),

    #[error("{0} does not support {1}")]
    Unsupported(&'static str, &'static str),
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::InvalidResponse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;

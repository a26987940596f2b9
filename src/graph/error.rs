use thiserror::Error;

pub type GraphResult<T> = Result<T, GraphError>;

/// Errors raised while authenticating to or reading from Microsoft Graph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("device code expired before sign-in completed")]
    DeviceCodeExpired,

    #[error("Graph API error: {code} - {message}")]
    Api { code: String, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

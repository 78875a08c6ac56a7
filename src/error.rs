use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Invalid seed url: {0}")]
    InvalidSeed(#[from] url::ParseError),
    #[error("Http client error: {0}")]
    Client(#[from] reqwest::Error),
    #[error("Record log error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Record serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Record writer task failed: {0}")]
    WriterJoin(#[from] tokio::task::JoinError),
    #[error("Record sink is closed")]
    SinkClosed,
}

/// Transport failures flattened at the fetch boundary. Nothing else is
/// allowed to cross it.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct FetchError {
    message: String,
}

impl FetchError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        Self::new(err.to_string())
    }
}

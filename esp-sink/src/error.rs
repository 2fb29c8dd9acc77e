use thiserror::Error;

/// Faults the sink can report. Malformed payloads are not among them: an
/// unparseable body degrades to [`crate::Payload::RawFallback`].
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("entry store lock poisoned")]
    LockPoisoned,
    #[error("failed to read request body: {0}")]
    Body(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for SinkError {
    fn from(e: toml::de::Error) -> Self {
        SinkError::Config(e.to_string())
    }
}

pub type SinkResult<T> = Result<T, SinkError>;

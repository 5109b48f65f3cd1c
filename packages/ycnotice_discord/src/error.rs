use thiserror::Error;
use ycnotice::StateError;

#[derive(Debug, Error)]
pub enum DiscordError {
    #[error("Failed to build Discord client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Discord request {path} failed: {source}")]
    Request {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Discord returned {status} for {path}: {body}")]
    Status {
        path: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Channel {0} cannot receive messages")]
    NotMessageable(u64),

    #[error("Invalid snowflake {0:?}")]
    InvalidId(String),

    #[error("Unknown grade {0}, expected 1 to 4")]
    UnknownGrade(u8),

    #[error(transparent)]
    State(#[from] StateError),
}

impl DiscordError {
    pub(crate) fn request(path: &str, source: reqwest::Error) -> Self {
        DiscordError::Request {
            path: path.to_string(),
            source,
        }
    }
}

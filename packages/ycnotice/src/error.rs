use thiserror::Error;

/// Failure of a single HTTP round trip. Callers treat it as "nothing new this
/// cycle" rather than as a fatal condition.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} returned status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Request { source, .. } if source.is_timeout())
    }

    pub(crate) fn request(url: &str, source: reqwest::Error) -> Self {
        FetchError::Request {
            url: url.to_string(),
            source,
        }
    }

    pub(crate) fn invalid_url(url: &str, source: url::ParseError) -> Self {
        FetchError::InvalidUrl {
            url: url.to_string(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Something on a detail page did not look the way the parser expected.
/// Never escapes `parse_detail`; the affected field degrades to empty.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseAnomaly {
    #[error("Neither the content wrapper nor a body element was found")]
    MissingContainer,

    #[error("Not a base64 image data URL")]
    InvalidDataUrl,

    #[error("Base64 payload could not be decoded: {0}")]
    Base64(#[from] base64::DecodeError),
}

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum StacError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("No '{0}' link advertised by the catalog")]
    MissingLink(String),

    #[error("Not supported by endpoint: {0}")]
    NotSupported(String),

    #[error("Invalid CQL2 filter: {0}")]
    InvalidFilter(String),

    #[error("Invalid query expression: {0}")]
    InvalidQuery(String),

    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("No expected result count for filter scenario: {0}")]
    UnknownScenario(String),

    #[error("No expectation profile for Data Challenge {0}")]
    UnknownDataChallenge(u8),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, StacError>;

impl From<std::io::Error> for StacError {
    fn from(e: std::io::Error) -> Self {
        StacError::Io(e.to_string())
    }
}

impl From<reqwest::Error> for StacError {
    fn from(e: reqwest::Error) -> Self {
        match e.url() {
            Some(url) => StacError::Http(format!("{} ({})", e, url)),
            None => StacError::Http(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for StacError {
    fn from(e: serde_json::Error) -> Self {
        StacError::Json(e.to_string())
    }
}

impl From<url::ParseError> for StacError {
    fn from(e: url::ParseError) -> Self {
        StacError::InvalidEndpoint(e.to_string())
    }
}

impl StacError {
    /// True when the error came back from the remote service rather than
    /// from local configuration or parsing.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            StacError::Http(_)
                | StacError::Status { .. }
                | StacError::Json(_)
                | StacError::MissingLink(_)
                | StacError::NotSupported(_)
                | StacError::CollectionNotFound(_)
        )
    }
}

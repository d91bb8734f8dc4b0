use crate::response::Failure;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid URL: {message}")]
    InvalidUrl { message: String },

    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File must be of the type folder: {path}")]
    NotAFolder { path: String },

    #[error("File must not be of the type folder: {path}")]
    NotAFile { path: String },

    #[error("{operation} needs a file id or a path")]
    MissingTarget { operation: &'static str },

    #[error("Unexpected response payload: {message}")]
    UnexpectedPayload { message: String },

    #[error("Could not start request worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error(transparent)]
    Failure(#[from] Failure),

    #[error("Request was aborted")]
    Aborted,
}

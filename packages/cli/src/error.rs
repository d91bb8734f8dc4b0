use std::path::PathBuf;

/// Errors from the command-line front end.
#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Config {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Client(#[from] phile::Error),

    #[error("Logger already initialized: {0}")]
    Logger(#[from] log::SetLoggerError),

    #[error("Cannot write output: {0}")]
    Output(#[from] std::io::Error),

    #[error("{0}")]
    Usage(String),
}

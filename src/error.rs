use std::path::PathBuf;

/// Error types for the chickadee library.
///
/// Only configuration and input problems surface as errors. Failures to
/// resolve a single address are reported as failed records instead, see
/// [`crate::resolver::ResolutionFailure`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A resolution service that needs a credential was selected without one.
    #[error("{backend} requires an API key; set --api-key or CHICKADEE_API_KEY")]
    MissingApiKey { backend: &'static str },

    /// Input that cannot be scanned for addresses.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// The configuration file exists but could not be parsed.
    #[error("invalid config file {path}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),

    /// A report could not be serialized.
    #[error("failed to write CSV report")]
    Csv(#[source] csv::Error),

    #[error("failed to serialize JSON")]
    Json(#[source] serde_json::Error),

    /// An I/O error occurred.
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        // Keep the io::Error reachable so callers can spot a closed pipe.
        if err.is_io_error() {
            Error::Io(err.into())
        } else {
            Error::Csv(err)
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            Error::Io(err.into())
        } else {
            Error::Json(err)
        }
    }
}

/// Convenience type alias for Results using the library error.
pub type Result<T> = std::result::Result<T, Error>;

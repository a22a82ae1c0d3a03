use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The survey payload is not a mapping of answers.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Classifier or encoder artifacts failed to load at startup. Retryable.
    #[error("Model is not loaded on server: {0}")]
    ModelUnavailable(String),

    #[error("Feature columns do not line up with the classifier: {0}")]
    ColumnMismatch(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Stored record is corrupt: {0}")]
    CorruptRecord(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Callers may retry once the service has been redeployed with artifacts.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ModelUnavailable(_))
    }
}

/// Failures while reading the offline-trained artifacts.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Failed to read artifact {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse artifact {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid artifact: {0}")]
    Invalid(String),
}

use thiserror::Error;

/// Errors that can occur while running the ingest binary.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    /// I/O error
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Database could not be opened or written
    #[error("Database error: {0}")]
    Database(String),

    /// HTTP client could not be built
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Runtime creation or async error
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Ingest run failed
    #[error("Ingest failed: {0}")]
    Ingest(#[from] portal_import::IngestError),
}

impl CliError {
    pub(crate) fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub(crate) fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub(crate) fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }
}

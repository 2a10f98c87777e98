/// Session errors.
///
/// `Clone` so a single failure can be handed to every caller awaiting the
/// same in-flight computation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, serde::Serialize)]
pub enum Error {
    #[error("Could not decode {name}: {reason}")]
    Decode { name: String, reason: String },

    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("No document is open")]
    NoDocument,

    #[error("Document is not open: {0}")]
    NotOpen(String),

    #[error("Unknown citation: {0}")]
    UnknownCitation(String),

    #[error("Page not found: {0}")]
    PageNotFound(usize),

    #[error("Invalid query: {0}")]
    Query(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<citelens_core::QueryError> for Error {
    fn from(err: citelens_core::QueryError) -> Self {
        Error::Query(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Task(err.to_string())
    }
}

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Index(#[from] dehash_index::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unable to open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{input}' is not a hex digest")]
    InvalidDigest { input: String },

    #[error("Index is not sorted: entry {index} is out of order")]
    Unsorted { index: u64 },

    #[error("{bad} of {total} words did not resolve to themselves")]
    CheckFailed { bad: u64, total: u64 },

    #[error("Aborted")]
    Aborted,

    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Failed to encode report: {0}")]
    Json(#[from] serde_json::Error),
}

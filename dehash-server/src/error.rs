#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Index(#[from] dehash_index::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unable to listen on {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Aborted")]
    Aborted,
}

//! TCP front end for a loaded index.
//!
//! Clients send one hex digest per line and get back the word followed by a
//! newline, or a bare newline when the digest is unknown or not valid hex. An
//! empty line or end of stream closes the connection.

pub mod error;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use dehash_index::{Digest, LookupEngine};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

pub use error::Error;

/// Longest request line accepted, newline included. Requests past this close
/// the connection.
pub const MAX_REQUEST_LEN: usize = 256;

/// Answers requests on `stream` until the client closes it or sends an empty
/// line. Returns the number of requests answered.
pub async fn handle_client<S>(stream: S, engine: &LookupEngine) -> Result<u64, Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut line = Vec::with_capacity(MAX_REQUEST_LEN);
    let mut word = Vec::with_capacity(64);
    let mut answered = 0u64;

    loop {
        line.clear();
        let read =
            (&mut reader).take(MAX_REQUEST_LEN as u64).read_until(b'\n', &mut line).await?;
        if read == 0 {
            break;
        }

        if line.last() == Some(&b'\n') {
            line.pop();
        } else if read == MAX_REQUEST_LEN {
            warn!(max = MAX_REQUEST_LEN, "Request line too long, closing connection");
            break;
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }

        if line.is_empty() {
            break;
        }

        let found = match Digest::from_hex(line.trim_ascii()) {
            Some(digest) => engine.lookup_into(&digest, &mut word),
            None => {
                debug!("Request is not a hex digest");
                false
            }
        };

        if found {
            word.push(b'\n');
            writer.write_all(&word).await?;
        } else {
            writer.write_all(b"\n").await?;
        }
        writer.flush().await?;
        answered += 1;
    }

    writer.shutdown().await?;

    Ok(answered)
}

type WorkerResult = (SocketAddr, Result<u64, Error>);

/// Accepts connections and serves each on its own task, with at most
/// `max_clients` connections served at once.
pub struct LookupServer {
    engine: Arc<LookupEngine>,
    max_clients: usize,
}

impl LookupServer {
    pub fn new(engine: Arc<LookupEngine>, max_clients: usize) -> Self {
        let max_clients = if max_clients == 0 {
            warn!("Max clients set to zero. Changing it to 1.");
            1
        } else {
            max_clients
        };

        Self { engine, max_clients }
    }

    pub fn max_clients(&self) -> usize {
        self.max_clients
    }

    /// Serves until `shutdown` resolves. Connections still open at that point
    /// are dropped once their current request has been answered.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), Error>
    where
        F: Future<Output = ()>,
    {
        let mut workers: JoinSet<WorkerResult> = JoinSet::new();
        tokio::pin!(shutdown);

        if let Ok(addr) = listener.local_addr() {
            info!(%addr, max_clients = self.max_clients, "The server is listening for new connections");
        }

        loop {
            while let Some(result) = workers.try_join_next() {
                reap(result);
            }

            if workers.len() >= self.max_clients {
                tokio::select! {
                    _ = &mut shutdown => break,
                    Some(result) = workers.join_next() => reap(result),
                }
                continue;
            }

            tokio::select! {
                _ = &mut shutdown => break,
                Some(result) = workers.join_next(), if !workers.is_empty() => reap(result),
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        info!(%peer, "New connection");
                        let engine = Arc::clone(&self.engine);
                        workers.spawn(async move { (peer, handle_client(stream, &engine).await) });
                    }
                    Err(e) => warn!(error = %e, "Failed to accept a connection"),
                },
            }
        }

        info!(open_connections = workers.len(), "Shutting down");
        workers.shutdown().await;

        Ok(())
    }
}

fn reap(result: Result<WorkerResult, JoinError>) {
    match result {
        Ok((peer, Ok(answered))) => info!(%peer, answered, "Connection closed"),
        Ok((peer, Err(e))) => warn!(%peer, error = %e, "Connection failed"),
        Err(e) if e.is_cancelled() => {}
        Err(e) => error!(error = %e, "Connection worker panicked"),
    }
}

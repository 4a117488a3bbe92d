use std::fs::File;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use dehash_index::LookupEngine;
use dehash_index::memory::{confirm_allocation, load_memory_required};
use dehash_server::{Error, LookupServer};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dehash-server")]
#[command(about = "Serve reverse-hash lookups from a sorted dehash index over TCP")]
struct Args {
    /// Sorted index file to load
    #[arg(env = "DEHASH_INDEX")]
    index: PathBuf,

    /// Port to listen on
    #[arg(short, long, env = "DEHASH_PORT", default_value_t = 7777,
          value_parser = clap::value_parser!(u16).range(1..))]
    port: u16,

    /// Maximum number of connections served at once
    #[arg(short = 'c', long, env = "DEHASH_MAX_CLIENTS", default_value_t = 16)]
    max_clients: usize,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Skip the memory confirmation prompt
    #[arg(short, long)]
    yes: bool,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Unable to listen for ctrl-c; serving until killed");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let required = load_memory_required(&File::open(&args.index)?)?;
    if !args.yes && !confirm_allocation(required, &mut io::stdin().lock(), &mut io::stdout())? {
        println!("ABORTING");
        return Err(Error::Aborted);
    }

    let path = args.index.clone();
    let engine = tokio::task::spawn_blocking(move || LookupEngine::open(path)).await??;
    info!(
        index = %args.index.display(),
        hash = engine.hash().name(),
        entries = engine.entry_count(),
        "The index is loaded successfully"
    );

    let addr = SocketAddr::new(args.bind, args.port);
    let listener =
        TcpListener::bind(addr).await.map_err(|source| Error::Bind { addr, source })?;

    LookupServer::new(Arc::new(engine), args.max_clients)
        .serve(listener, shutdown_signal())
        .await
}

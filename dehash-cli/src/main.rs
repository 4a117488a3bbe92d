use clap::{Parser, Subcommand};
use dehash_cli::Error;
use dehash_cli::commands::{
    self, BuildArgs, CheckArgs, LookupArgs, MergeArgs, OptimizeArgs, SortArgs, VerifyArgs,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dehash")]
#[command(about = "Build and query compact reverse-hash indexes of wordlists")]
struct Cli {
    /// Disable progress bars
    #[arg(long, global = true)]
    no_progress: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build an unsorted index from a wordlist
    Build(BuildArgs),
    /// Sort an index in place by digest prefix
    Sort(SortArgs),
    /// Merge two sorted indexes built with the same hash and data width
    Merge(MergeArgs),
    /// Check that every word of a wordlist resolves to itself
    Check(CheckArgs),
    /// Reverse hex digests against a sorted index
    Lookup(LookupArgs),
    /// Find the data width giving the smallest index for a wordlist
    Optimize(OptimizeArgs),
    /// Check that an index is sorted
    Verify(VerifyArgs),
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Build(args) => commands::build(args, cli.no_progress).await,
        Command::Sort(args) => commands::sort(args).await,
        Command::Merge(args) => commands::merge(args, cli.no_progress).await,
        Command::Check(args) => commands::check(args, cli.no_progress).await,
        Command::Lookup(args) => commands::lookup(args).await,
        Command::Optimize(args) => commands::optimize(args).await,
        Command::Verify(args) => commands::verify(args).await,
    }
}

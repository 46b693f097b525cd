// gitvault-helper/src/main.rs

mod context;
mod dispatcher;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

use gitvault_common::error::Error;

use crate::context::HelperContext;
use crate::dispatcher::Dispatcher;

#[derive(Parser)]
#[command(
    name = "git-credential-gitvault",
    version,
    about = "Git credential helper with multi-host authentication support"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// [Git] Return a stored or newly created credential
    Get,
    /// [Git] Store a credential Git has validated
    Store,
    /// [Git] Erase a stale credential
    Erase,
    /// Clear the cached org -> authority mappings
    ClearAuthorityCache,
    /// Report environment and backend status
    Diagnose,
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    // stdout belongs to the Git protocol; all diagnostics go to stderr.
    let filter = EnvFilter::from_default_env();
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let exit_code = match run(cli).await {
        Ok(()) => 0,
        Err(err) => {
            print_fatal(&err);
            1
        }
    };
    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> Result<(), Error> {
    let context = HelperContext::bootstrap()?;
    let dispatcher = Dispatcher::new(context);

    match cli.command {
        Commands::Get => dispatcher.get().await,
        Commands::Store => dispatcher.store().await,
        Commands::Erase => dispatcher.erase().await,
        Commands::ClearAuthorityCache => dispatcher.clear_authority_cache().await,
        Commands::Diagnose => dispatcher.diagnose().await,
    }
}

/// Print the error and its whole source chain so root causes stay visible.
fn print_fatal(err: &Error) {
    eprintln!("fatal: {}", err);
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        eprintln!("fatal: {}", inner);
        source = inner.source();
    }
}

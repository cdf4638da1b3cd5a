//! verify-cache: read back the records written by cache-refresh.
//!
//! Usage:
//!   verify-cache latest                      Print the latest pointer document
//!   verify-cache history [--limit N]         List the N most recent refreshes
//!   verify-cache get <collection> <document> Print any document

use anyhow::Context;
use clap::{Parser, Subcommand};
use context_cache_refresh::auth::resolve_token_source;
use context_cache_refresh::inspect::{self, Inspection};
use context_cache_refresh::store::{DocumentStore, FirestoreStore};
use context_cache_refresh::transport::HttpTransport;
use context_cache_refresh::{config, logging, Config};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "verify-cache", version, about = "Inspect context cache records in Firestore")]
struct Cli {
    /// Google Cloud project id
    #[arg(long, env = "GCP_PROJECT")]
    project: String,

    /// Firestore database id
    #[arg(long, env = "DB_NAME", default_value = "(default)")]
    database: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the latest pointer document
    Latest,
    /// List the most recent historical records
    History {
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Print an arbitrary document
    Get { collection: String, document: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    config::load_dotenv();
    logging::init();
    let cli = Cli::parse();

    let config = Config::new(cli.project, "global", "unused", cli.database)
        .with_firestore_overrides(|key| std::env::var(key).ok());
    let client = HttpTransport::build_client()?;
    let tokens = if config.firestore_emulator {
        None
    } else {
        Some(resolve_token_source(client.clone()))
    };
    let store: Arc<dyn DocumentStore> = Arc::new(
        FirestoreStore::connect(&config, HttpTransport::new(client, tokens))
            .context("configuring Firestore client")?,
    );

    let inspection = match cli.command {
        Command::Latest => Inspection::Latest,
        Command::History { limit } => Inspection::History { limit },
        Command::Get {
            collection,
            document,
        } => Inspection::Get {
            collection,
            document,
        },
    };
    let found = inspect::run(store, &inspection, &mut std::io::stdout().lock())
        .await
        .context("reading Firestore")?;
    Ok(if found {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

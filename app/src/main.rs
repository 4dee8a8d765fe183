#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod command;

use command::{
    ChatInput, ChatStrategy, CommandStrategy, HistoryStrategy, InfoStrategy, InitStrategy,
    RemoveStrategy, SessionsStrategy, VersionStrategy,
};

#[derive(Parser)]
#[command(name = "chatrs")]
#[command(about = "Streaming multi-turn chat sessions", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start or resume a conversation
    Chat {
        /// Session ID to resume (a new one is generated if omitted)
        #[arg(short, long)]
        session: Option<String>,

        /// Single message to send
        #[arg(short, long)]
        message: Option<String>,

        /// Model to use
        #[arg(short = 'M', long)]
        model: Option<String>,
    },
    /// Print a stored conversation
    History {
        /// Session ID
        id: String,
    },
    /// List stored conversations
    Sessions,
    /// Delete a stored conversation
    Remove {
        /// Session ID
        id: String,
    },
    /// Initialize configuration
    Init,
    /// Show configuration
    Info,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Chat {
            session,
            message,
            model,
        } => {
            ChatStrategy
                .execute(ChatInput {
                    session_id: session,
                    message,
                    model,
                })
                .await
        }
        Commands::History { id } => HistoryStrategy.execute(id).await,
        Commands::Sessions => SessionsStrategy.execute(()).await,
        Commands::Remove { id } => RemoveStrategy.execute(id).await,
        Commands::Init => InitStrategy.execute(()).await,
        Commands::Info => InfoStrategy.execute(()).await,
        Commands::Version => VersionStrategy.execute(()).await,
    }
}

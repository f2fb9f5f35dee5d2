use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use gennie::cli::extract::ExtractArgs;
use gennie::cli::search::SearchArgs;
use gennie::cli::{extract, index, scan, search, session, workspaces};
use gennie::context::RunContext;
use gennie::extract::Extractor;
use gennie::jobs::CancelFlag;
use gennie::reader::ReaderRegistry;
use gennie::search::SearchMode;
use gennie::store::TurnStore;
use gennie::Config;

#[derive(Parser)]
#[command(name = "gennie")]
#[command(about = "Normalize and search local AI coding-assistant conversations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "gennie.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// List workspaces known to the installed assistants
    Scan {
        /// Only workspaces rooted at this folder
        #[arg(short, long)]
        folder: Option<String>,
    },

    /// Extract, enrich and store conversations
    Extract {
        /// Workspace ID (see `gennie scan`)
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        workspace: Option<String>,

        /// Extract every scanned workspace
        #[arg(long)]
        all: bool,

        /// Only this agent (claude_code, copilot, cursor)
        #[arg(short, long)]
        agent: Option<String>,

        /// Replace already stored turns
        #[arg(long)]
        force: bool,
    },

    /// Search stored turns
    Search {
        query: String,

        /// keyword, semantic or hybrid (default from config)
        #[arg(short, long)]
        mode: Option<SearchMode>,

        /// Restrict to a role; repeatable
        #[arg(short, long = "role")]
        roles: Vec<String>,

        #[arg(long, default_value_t = 1)]
        page: usize,

        #[arg(long, default_value_t = 20)]
        page_size: usize,

        /// Minimum semantic similarity (0..1)
        #[arg(long)]
        min_score: Option<f32>,

        /// Use the stricter semantic threshold
        #[arg(long)]
        strict: bool,

        /// Also print per-day keyword match counts
        #[arg(long)]
        timeline: bool,

        /// Print the response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rebuild the keyword index and refresh embeddings
    Reindex {
        /// Skip the embedding backfill
        #[arg(long)]
        keyword_only: bool,
    },

    /// Embed turns whose text changed since the last run
    Backfill {
        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// List extracted workspaces
    Workspaces,

    /// Show the turns of a session
    Session {
        session_id: String,

        /// Print full original text
        #[arg(long)]
        full: bool,
    },
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config
    let (config, config_error) = match Config::load(&cli.config) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    init_tracing(&config.logging.level);
    if let Some(e) = config_error {
        tracing::warn!("{:#}; using defaults", e);
    }

    // Initialize store
    let store = TurnStore::open(&config.database_path())?;

    // Initialize reader registry
    let registry = Arc::new(ReaderRegistry::new(&config));
    let ctx = Arc::new(RunContext::new(config)?);

    // Ctrl-C lets the current unit of a long job finish, then stops
    let cancel = CancelFlag::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current unit");
            on_signal.cancel();
        }
    });

    match cli.command {
        Commands::Scan { folder } => {
            let extractor = Extractor::new(registry, ctx);
            scan::run(&extractor, folder)?;
        }
        Commands::Extract {
            workspace,
            all,
            agent,
            force,
        } => {
            let extractor = Extractor::new(registry, ctx);
            let args = ExtractArgs {
                workspace,
                all,
                agent,
                force,
            };
            extract::run(&extractor, &store, args, &cancel).await?;
        }
        Commands::Search {
            query,
            mode,
            roles,
            page,
            page_size,
            min_score,
            strict,
            timeline,
            json,
        } => {
            let args = SearchArgs {
                query,
                mode,
                roles,
                page,
                page_size,
                min_score,
                strict,
                timeline,
                json,
            };
            search::run(&store, &ctx, args)?;
        }
        Commands::Reindex { keyword_only } => {
            index::reindex(&store, &ctx, keyword_only, &cancel)?;
        }
        Commands::Backfill { model, batch_size } => {
            index::backfill(&store, &ctx, model, batch_size, &cancel)?;
        }
        Commands::Workspaces => {
            workspaces::run(&store)?;
        }
        Commands::Session { session_id, full } => {
            session::run(&store, &session_id, full)?;
        }
    }

    Ok(())
}

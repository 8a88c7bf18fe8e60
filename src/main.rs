//! lsif-xrepo CLI - Query LSIF storage files across repositories

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use lsif_xrepo::config::{self, LsifConfig};
use lsif_xrepo::metrics::{CountingRecorder, LogRecorder, MetricsRecorder};
use lsif_xrepo::xrepo::SqliteXrepoIndex;
use lsif_xrepo::{Database, EngineContext, PageToken, Position, StorageLayout};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "lsif-xrepo")]
#[command(version)]
#[command(about = "Cross-repository code intelligence over LSIF storage files")]
#[command(long_about = r#"
lsif-xrepo answers code intelligence queries against per-repository LSIF
storage files, following monikers into other repositories through the
cross-repository index.

Example usage:
  lsif-xrepo definitions --repository github.com/x/app --commit a1 --path src/main.ts --line 4 --character 10
  lsif-xrepo references --repository github.com/x/app --commit a1 --path src/main.ts --line 4 --character 10 --page 1
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print cache and query counters to stderr when done
    #[arg(long, global = true)]
    stats: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Target {
    /// Repository identifier
    #[arg(short, long)]
    repository: String,

    /// Commit of the repository
    #[arg(long)]
    commit: String,

    /// Document path relative to the repository root
    #[arg(short, long)]
    path: String,

    /// Directory holding storage files (overrides the config)
    #[arg(long)]
    storage_root: Option<PathBuf>,

    /// Cross-repository index (overrides the config)
    #[arg(long)]
    xrepo: Option<PathBuf>,
}

#[derive(Args)]
struct At {
    /// Zero-based line
    #[arg(short, long)]
    line: u32,

    /// Zero-based character
    #[arg(long)]
    character: u32,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a document was indexed
    Exists {
        #[command(flatten)]
        target: Target,
    },

    /// Find the definitions of the symbol at a position
    Definitions {
        #[command(flatten)]
        target: Target,
        #[command(flatten)]
        at: At,
    },

    /// Find references to the symbol at a position
    References {
        #[command(flatten)]
        target: Target,
        #[command(flatten)]
        at: At,

        /// Page of remote references to fetch
        #[arg(long)]
        page: Option<u32>,
    },

    /// Show hover text for the symbol at a position
    Hover {
        #[command(flatten)]
        target: Target,
        #[command(flatten)]
        at: At,
    },
}

impl Commands {
    fn target(&self) -> &Target {
        match self {
            Commands::Exists { target }
            | Commands::Definitions { target, .. }
            | Commands::References { target, .. }
            | Commands::Hover { target, .. } => target,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut settings = config::load_config(cli.config.as_deref())?.unwrap_or_default();
    settings.apply_env();

    let target = cli.command.target();
    if let Some(root) = &target.storage_root {
        settings.storage_root = root.clone();
    }
    if let Some(xrepo) = &target.xrepo {
        settings.xrepo_database = xrepo.clone();
    }

    let counters = cli.stats.then(|| Arc::new(CountingRecorder::new()));
    let recorder: Arc<dyn MetricsRecorder> = match &counters {
        Some(counters) => counters.clone(),
        None => Arc::new(LogRecorder),
    };
    let ctx = build_context(&settings, recorder)?;
    let db = Database::for_repository(ctx, &target.repository, &target.commit);
    tracing::debug!(storage_file = %db.storage_file().display(), "querying");

    let output = match &cli.command {
        Commands::Exists { target } => {
            serde_json::json!({ "exists": db.exists(&target.path).await? })
        }
        Commands::Definitions { target, at } => {
            let locations = db.definitions(&target.path, Position::new(at.line, at.character)).await?;
            serde_json::to_value(locations)?
        }
        Commands::References { target, at, page } => {
            let page = page.map(PageToken::from_index);
            let result = db.references(&target.path, Position::new(at.line, at.character), page).await?;
            serde_json::to_value(result)?
        }
        Commands::Hover { target, at } => {
            let hover = db.hover(&target.path, Position::new(at.line, at.character)).await?;
            serde_json::to_value(hover)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);

    if let Some(counters) = counters {
        eprintln!("{}", serde_json::to_string_pretty(&counters.snapshot())?);
    }

    Ok(())
}

fn build_context(settings: &LsifConfig, recorder: Arc<dyn MetricsRecorder>) -> anyhow::Result<EngineContext> {
    let xrepo = SqliteXrepoIndex::open(&settings.xrepo_database, settings.references_page_size, recorder.clone())?;
    let layout = StorageLayout::new(&settings.storage_root, settings.per_commit_storage);

    Ok(EngineContext::new(
        Arc::new(xrepo),
        layout,
        settings.connection_cache_capacity,
        settings.document_cache_capacity,
        recorder,
    ))
}

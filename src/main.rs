use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marginalia::engine::SessionEngine;
use marginalia::gen::GeneratorClient;
use marginalia::store::Store;
use marginalia::{api, tree_render};

#[derive(Parser)]
#[command(name = "marginalia")]
#[command(about = "Interactive reading assistant: annotate, branch, and consolidate generated texts")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Marginalia server
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value = "4020")]
        port: u16,

        /// Path to the session store (defaults to the platform data directory)
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// Print the version tree of the stored session
    Tree {
        /// Path to the session store (defaults to the platform data directory)
        #[arg(long)]
        store: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "marginalia=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Some(Commands::Serve { port, store }) => {
            serve(port, store).await?;
        }
        Some(Commands::Tree { store }) => {
            let store = open_store(store)?;
            store.migrate()?;
            let engine = SessionEngine::load(store);
            print!("{}", tree_render::render_tree(engine.tree(), engine.collection()));
        }
        None => {
            // Default: start server
            serve(4020, None).await?;
        }
    }

    Ok(())
}

async fn serve(port: u16, store_path: Option<PathBuf>) -> anyhow::Result<()> {
    tracing::info!("Starting Marginalia server on port {}", port);

    let store = open_store(store_path)?;
    store.migrate()?;
    let engine = SessionEngine::load(store);
    let client = GeneratorClient::from_env();

    let app = api::create_router(api::AppState::new(engine, client));

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("Marginalia server listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

fn open_store(path: Option<PathBuf>) -> anyhow::Result<Store> {
    match path {
        Some(path) => Store::open(path),
        None => Store::open_default(),
    }
}

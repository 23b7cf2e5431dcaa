use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use noteai::ai::{Assistant, HttpTransport, ModelClient};
use noteai::config::Settings;
use noteai::{api, db};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;

#[derive(Parser)]
#[command(name = "noteai")]
#[command(about = "Note-taking server with AI-assisted writing and study tools")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Address to bind
        #[arg(long, default_value = DEFAULT_HOST)]
        host: String,

        /// Port for HTTP API
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Apply pending database migrations and exit
    Migrate,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "noteai=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn open_database(settings: &Settings) -> anyhow::Result<db::Database> {
    let db = match &settings.database_path {
        Some(path) => db::Database::open(path.clone())?,
        None => db::Database::open_default()?,
    };
    db.migrate()?;
    Ok(db)
}

async fn serve(settings: Settings, host: &str, port: u16) -> anyhow::Result<()> {
    let db = open_database(&settings)?;

    let client = ModelClient::from_settings(&settings.ai, Arc::new(HttpTransport::new()));
    match client.provider() {
        Some(provider) => tracing::info!("AI provider: {}", provider.as_str()),
        None => tracing::warn!("No AI provider API key configured; AI endpoints will return 503"),
    }

    let state = api::AppState::new(db, Assistant::new(client), settings);
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}")).await?;
    tracing::info!("NoteAI server listening on http://{}:{}", host, port);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let settings = Settings::from_env()?;

    match cli.command {
        Some(Commands::Serve { host, port }) => serve(settings, &host, port).await?,
        Some(Commands::Migrate) => {
            open_database(&settings)?;
            tracing::info!("Database is up to date");
        }
        None => serve(settings, DEFAULT_HOST, DEFAULT_PORT).await?,
    }

    Ok(())
}

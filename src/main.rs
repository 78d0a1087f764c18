//! Sous Chef - multilingual recipe assistant
//!
//! Runs the conversational recipe engine behind an HTTP API (`serve`, the
//! default), as an interactive terminal session (`chat`), or seeds the recipe
//! corpus from a JSON file (`import <file>`).

mod api;
mod config;
mod db;
mod llm;
mod providers;
mod runtime;
mod state_machine;

use api::{create_router, AppState};
use clap::{Parser, Subcommand};
use config::AppConfig;
use db::{Database, SeedRecipe};
use llm::{GeminiService, ImagenService, LlmService, LoggingService};
use runtime::{ConversationManager, DatabaseStore, ImageTarget, TurnEngine};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SEPARATOR: &str = "----------------";
const REPL_IMAGE: &str = "results.png";

/// Multilingual recipe assistant
#[derive(Parser)]
#[command(name = "sous-chef")]
#[command(about = "sous-chef - find, pick and picture a recipe in any language", long_about = None)]
#[command(version)]
struct Cli {
    /// Defaults to `serve`
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve,
    /// Talk to the assistant in the terminal
    Chat,
    /// Add recipes from a JSON file to the corpus
    Import {
        /// JSON array of `{ title, ingredients, steps }` records
        file: PathBuf,
    },
}

fn init_tracing(command: &Command) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sous_chef=info,tower_http=debug".into());

    match command {
        Command::Serve => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false),
            )
            .init(),
        // Keep logs off stdout so they don't interleave with the dialogue
        Command::Chat | Command::Import { .. } => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

fn open_database(config: &AppConfig) -> Result<Database, Box<dyn std::error::Error>> {
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    tracing::info!(path = %config.db_path.display(), "Opening database");
    Ok(Database::open(&config.db_path)?)
}

fn build_manager(
    config: &AppConfig,
    db: Database,
    images: ImageTarget,
) -> Result<ConversationManager, Box<dyn std::error::Error>> {
    if !config.has_credentials() {
        tracing::warn!("No model credentials configured. Set GEMINI_API_KEY or LLM_GATEWAY.");
    }

    let text: Arc<dyn LlmService> = Arc::new(LoggingService::new(Arc::new(GeminiService::new(
        config.api_key.clone(),
        &config.text_model,
        config.gateway.as_deref(),
    )?)));
    let image = Arc::new(ImagenService::new(
        config.api_key.clone(),
        &config.image_model,
        config.gateway.as_deref(),
    )?);
    tracing::info!(
        text_model = %config.text_model,
        image_model = %config.image_model,
        "Models configured"
    );

    let capabilities = providers::model_capabilities(text, image, Arc::new(db.clone()));
    let engine = TurnEngine::new(capabilities, config.engine);
    Ok(ConversationManager::new(
        engine,
        Arc::new(DatabaseStore::new(db)),
        images,
    ))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let command = Cli::parse().command.unwrap_or(Command::Serve);
    init_tracing(&command);

    let config = AppConfig::from_env();
    let db = open_database(&config)?;

    match command {
        Command::Serve => serve(&config, db).await,
        Command::Chat => chat(&config, db).await,
        Command::Import { file } => import(&db, &file),
    }
}

async fn serve(config: &AppConfig, db: Database) -> Result<(), Box<dyn std::error::Error>> {
    let manager = build_manager(
        config,
        db,
        ImageTarget::PerConversation(config.image_dir.clone()),
    )?;
    let state = AppState::new(Arc::new(manager));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Sous Chef server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn chat(config: &AppConfig, db: Database) -> Result<(), Box<dyn std::error::Error>> {
    let manager = build_manager(
        config,
        db,
        ImageTarget::Fixed(config.image_dir.join(REPL_IMAGE)),
    )?;
    let conv_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conv_id = %conv_id, "Chat session started");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let text = line.trim();
        if matches!(text.to_lowercase().as_str(), "quit" | "exit") {
            break;
        }
        if text.is_empty() {
            continue;
        }

        let reply = match manager.send_message(&conv_id, text).await {
            Ok(delivered) => delivered.outcome.response,
            Err(e) => {
                tracing::error!(conv_id = %conv_id, error = %e, "Turn failed");
                format!("Something went wrong: {e}")
            }
        };
        stdout
            .write_all(format!("{SEPARATOR}\n{reply}\n{SEPARATOR}\n").as_bytes())
            .await?;
    }

    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}

fn import(db: &Database, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    let recipes: Vec<SeedRecipe> = serde_json::from_str(&raw)?;
    let added = db.import_recipes(&recipes)?;
    tracing::info!(
        path = %path.display(),
        added,
        total = db.recipe_count()?,
        "Recipes imported"
    );
    Ok(())
}

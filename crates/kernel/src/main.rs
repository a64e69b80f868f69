//! Competition Signup server.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tower_sessions::MemoryStore;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use signup_kernel::config::{self, Config, StoreBackend};
use signup_kernel::state::AppState;
use signup_kernel::store::{AdminStore, RecordFields, RedisAdminStore};
use signup_kernel::{routes, session};

/// Competition signup server and admin tooling.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Serve,

    /// Create or replace an admin account in Redis.
    AdminAdd {
        /// Admin username.
        username: String,

        /// Admin password, stored as an Argon2 hash.
        #[arg(long)]
        password: String,

        /// Display name shown on the admin home page.
        #[arg(long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let args = Args::parse();

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::AdminAdd {
            username,
            password,
            name,
        } => admin_add(&username, &password, name).await,
    }
}

async fn serve() -> Result<()> {
    info!("Starting competition signup server");

    let config = Config::from_env().context("failed to load configuration")?;
    info!(port = config.port, backend = ?config.store_backend, "Configuration loaded");

    let state = AppState::new(&config)
        .await
        .context("failed to initialize application state")?;

    let app = match config.store_backend {
        StoreBackend::Redis => {
            let store = session::redis_session_store(&config.redis_url).await?;
            routes::app(state, session::create_session_layer(store, &config)?)?
        }
        StoreBackend::Memory => {
            let store = MemoryStore::default();
            routes::app(state, session::create_session_layer(store, &config)?)?
        }
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;

    info!(%addr, "Server listening");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

async fn admin_add(username: &str, password: &str, name: Option<String>) -> Result<()> {
    let redis_url = config::redis_url_from_env();
    let redis = redis::Client::open(redis_url.as_str()).context("invalid REDIS_URL")?;
    let admins = RedisAdminStore::new(redis);

    let mut attributes = RecordFields::new();
    if let Some(name) = name {
        attributes.insert("name".to_string(), name);
    }

    admins
        .add_admin(username, password, &attributes)
        .await
        .context("failed to add admin")?;

    info!(username = %username, "Admin added");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

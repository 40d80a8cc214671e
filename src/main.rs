use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cowatch::{create_router, AppState, Config, MemoryStore, NatsStore, PlayerEnv, StateStore};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cowatch")]
#[command(about = "Synchronized group video playback")]
struct Args {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/cowatch")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the local control API
    Serve {
        /// Keep rooms in memory instead of NATS
        #[arg(long)]
        memory: bool,
    },

    /// Create a room and print its join code
    CreateRoom {
        /// Owner user id
        #[arg(short, long)]
        owner: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("Cowatch v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    match args.command {
        Command::Serve { memory } => serve(cfg, memory).await,
        Command::CreateRoom { owner } => {
            let store = connect_nats(&cfg).await?;
            let room = store.create_room(&owner).await?;
            info!("Created room {} (id={}) owned by {}", room.code, room.id, room.owner_id);
            println!("{}", room.code);
            Ok(())
        }
    }
}

async fn serve(cfg: Config, memory: bool) -> Result<()> {
    let store: Arc<dyn StateStore> = if memory {
        info!("Using in-memory room store");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(connect_nats(&cfg).await?)
    };

    let env = PlayerEnv::headless(cfg.sync.widget_poll_interval(), cfg.sync.manifest_timeout())?;
    let state = AppState::new(store, env, cfg.sync.clone());
    let app = create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn connect_nats(cfg: &Config) -> Result<NatsStore> {
    NatsStore::connect(&cfg.nats.url, &cfg.nats.rooms_bucket, &cfg.nats.state_bucket).await
}

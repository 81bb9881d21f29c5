use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::network::Server;
use server::store::{FileStore, MemoryStore, PlayerStore};
use shared::{DEFAULT_PORT, ROOM_CAPACITY};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Maximum players per room
    #[arg(short, long, default_value_t = ROOM_CAPACITY)]
    capacity: usize,

    /// Persist player records to this file instead of keeping them in memory
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Keep records already in the store instead of clearing them at startup
    #[arg(long)]
    keep_records: bool,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        ServerConfig {
            host: args.host,
            port: args.port,
            capacity: args.capacity,
            store_path: args.store,
            purge_on_start: !args.keep_records,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = ServerConfig::from(Args::parse());

    match config.store_path.clone() {
        Some(path) => {
            let store = FileStore::open(&path).await?;
            serve(config, store).await
        }
        None => serve(config, MemoryStore::new()).await,
    }
}

async fn serve<S: PlayerStore + 'static>(
    config: ServerConfig,
    store: S,
) -> Result<(), Box<dyn std::error::Error>> {
    let server = Server::bind(&config, store).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}

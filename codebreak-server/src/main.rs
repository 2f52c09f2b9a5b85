//! Codebreak server entry point.
//!
//! ```text
//! codebreak-server                     Run with ./codebreak-server.toml or defaults
//! codebreak-server --config <path>     Load a custom config TOML
//! codebreak-server --port 4242 --rooms 8
//! codebreak-server --gen-config        Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use codebreak_server::{Server, ServerConfig};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "codebreak-server", about = "Two-player code-breaking game server")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "codebreak-server.toml")]
    config: PathBuf,

    /// TCP port to listen on. Overrides the config file.
    #[arg(short, long)]
    port: Option<u16>,

    /// Number of rooms. Overrides the config file.
    #[arg(short, long)]
    rooms: Option<u32>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ServerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ServerConfig::load(&cli.config);
    if let Some(port) = cli.port {
        config.network.port = port;
    }
    if let Some(rooms) = cli.rooms {
        config.rooms.count = rooms;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("codebreak-server v{}", env!("CARGO_PKG_VERSION"));
    info!("listen: {}", config.listen_addr());
    info!("rooms: {}", config.rooms.count);

    let server = Server::new(config);
    let stop = server.stop_handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.cancel();
    });

    server.run().await?;
    Ok(())
}

//! Chat relay server example
//!
//! Run with: cargo run --example relay_server -- [OPTIONS]
//!
//! Examples:
//!   cargo run --example relay_server                       # binds to 0.0.0.0:9999
//!   cargo run --example relay_server -- --bind 127.0.0.1:4000
//!   cargo run --example relay_server -- --max-connections 20 --idle-timeout 300
//!
//! Then connect two clients:
//!   cargo run --example relay_client -- --username alice
//!   cargo run --example relay_client -- --username bob

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use chat_relay::{ChatServer, ServerConfig};

#[derive(Debug, Parser)]
#[command(name = "relay_server", about = "Group chat relay server")]
struct Args {
    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0:9999")]
    bind: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    max_connections: usize,

    /// Seconds a client may take to log in
    #[arg(long, default_value_t = 10)]
    login_timeout: u64,

    /// Disconnect clients silent for this many seconds
    #[arg(long)]
    idle_timeout: Option<u64>,

    /// Largest accepted frame in bytes
    #[arg(long)]
    max_frame_size: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chat_relay=debug".parse()?)
                .add_directive("relay_server=debug".parse()?),
        )
        .init();

    let mut config = ServerConfig::default()
        .bind(args.bind)
        .max_connections(args.max_connections)
        .login_timeout(Duration::from_secs(args.login_timeout));
    if let Some(secs) = args.idle_timeout {
        config = config.idle_timeout(Duration::from_secs(secs));
    }
    if let Some(size) = args.max_frame_size {
        config = config.max_frame_size(size);
    }

    println!("Starting chat relay on {}", config.bind_addr);

    let server = ChatServer::new(config);

    let result = server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await;

    let stats = server.stats().await;
    println!(
        "Stats: connections={} rejected={} broadcasts={} deliveries={} dropped={} uptime={}s",
        stats.total_connections,
        stats.rejected_connections,
        stats.registry.broadcasts,
        stats.registry.deliveries,
        stats.registry.dropped_recipients,
        stats.uptime.as_secs(),
    );

    if let Err(e) = result {
        eprintln!("Server error: {}", e);
    }

    Ok(())
}

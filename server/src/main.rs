mod client_manager;
mod network;

use clap::Parser;
use log::info;
use network::Server;
use std::time::Duration;

/// Authoritative arena-shooter server.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Simulation tick rate in Hz
    #[arg(short, long, default_value = "20")]
    tick_rate: u32,

    /// Maximum concurrent clients
    #[arg(short, long, default_value = "16")]
    max_clients: usize,

    /// Map index to load
    #[arg(long, default_value = "0")]
    map: usize,

    /// Number of bot players to seed
    #[arg(short, long, default_value = "0")]
    bots: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);
    let tick_duration = Duration::from_secs_f64(1.0 / args.tick_rate as f64);

    info!(
        "starting server on {} at {}Hz ({} max clients)",
        addr, args.tick_rate, args.max_clients
    );

    let mut server = Server::new(
        &addr,
        tick_duration,
        args.max_clients,
        args.map,
        args.bots,
    )
    .await?;

    server.run().await?;

    Ok(())
}

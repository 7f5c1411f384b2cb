//! Ironshard Server - MySQL-compatible wire protocol server

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use std::sync::Arc;

use ironshard::network::server::Server;
use ironshard::network::{AckHandler, RandomSalt};
use ironshard::protocol::ServerCapabilities;

/// Ironshard Server - A MySQL-compatible wire protocol server
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "4001")]
    port: u16,

    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Maximum concurrent connections
    #[arg(short = 'c', long, default_value = "100")]
    max_connections: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    println!(
        r#"
     ___                     _                   _
    |_ _|_ __ ___  _ __  ___| |__   __ _ _ __ __| |
     | || '__/ _ \| '_ \/ __| '_ \ / _` | '__/ _` |
     | || | | (_) | | | \__ \ | | | (_| | | | (_| |
    |___|_|  \___/|_| |_|___/_| |_|\__,_|_|  \__,_|

    Ironshard Server v0.1.0
    MySQL-compatible wire protocol server
    "#
    );

    let capabilities = ServerCapabilities::default();
    let server = Server::new(
        capabilities,
        Arc::new(AckHandler),
        Arc::new(RandomSalt),
        args.max_connections,
    );
    println!("🔧 Created server instance");

    let addr = Some(std::net::SocketAddr::from((
        args.host
            .parse::<std::net::IpAddr>()
            .context("Invalid host address")?,
        args.port,
    )));

    println!("🚀 Server configuration:");
    println!("   - Host: {}", args.host);
    println!("   - Port: {}", args.port);
    println!("   - Max connections: {}", args.max_connections);
    println!();
    println!("📡 Ready to accept connections");
    println!();
    println!("Connect with: mysql -h {} -P {} -u root", args.host, args.port);
    println!("(Any username/password will be accepted)");
    println!();

    // Handle shutdown gracefully
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run(addr).await {
            eprintln!("❌ Server error: {}", e);
        }
    });

    // Wait for Ctrl+C
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    println!("\n🛑 Shutting down server...");
    server_handle.abort();

    println!("👋 Goodbye!");

    Ok(())
}

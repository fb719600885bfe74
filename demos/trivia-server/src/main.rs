//! Runs a trivia coordinator with one open session.
//!
//! ```not_rust
//! cargo run -p trivia-server
//! cargo run -p trivia-server -- --bind 0.0.0.0:8080 --admin-bind 127.0.0.1:8081 --ttl 600
//! ```
//!
//! The session's access token is printed to stdout at startup. Browsers
//! send it with every message; the quiz master sends it in the `X-TRIVIA-APIKEY`
//! header.

use clap::Parser;
use trivia::logging;
use trivia::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "trivia-server")]
#[command(about = "Live multi-player trivia coordinator", long_about = None)]
struct Args {
    /// Address for browser WebSocket connections
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// Address for the admin HTTP API
    #[arg(long, default_value = "127.0.0.1:8081")]
    admin_bind: String,

    /// Name of the session to open
    #[arg(long, default_value = "trivia")]
    name: String,

    /// Seconds during which new players may join
    #[arg(long, default_value_t = 3600.0)]
    ttl: f64,

    /// Seconds between sweeps of expired, empty sessions (0 disables)
    #[arg(long, default_value_t = 60)]
    sweep_interval: u64,

    /// Seconds a single send to one player may take
    #[arg(long, default_value_t = 5)]
    send_timeout: u64,

    /// Seconds a new socket has to finish the WebSocket upgrade
    #[arg(long, default_value_t = 10)]
    handshake_timeout: u64,
}

#[tokio::main]
async fn main() {
    logging::init("info");

    let args = Args::parse();
    let config = SessionConfig {
        token_ttl_secs: args.ttl,
        sweep_interval_secs: args.sweep_interval,
        send_timeout_secs: args.send_timeout,
        handshake_timeout_secs: args.handshake_timeout,
        ..SessionConfig::default()
    };

    let server = match TriviaServer::builder()
        .bind(&args.bind)
        .admin_bind(&args.admin_bind)
        .session_config(config)
        .build()
        .await
    {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "could not start");
            std::process::exit(1);
        }
    };

    let token = server.open_session(&args.name).await;
    tracing::info!(
        session = %args.name,
        ws = %args.bind,
        admin = %args.admin_bind,
        "session open"
    );
    println!("access token: {token}");

    if let Err(e) = server.run().await {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}

//! Tandem server binary
//!
//! Real-time room synchronization server for collaborative editing.
//!
//! ## Usage
//!
//! ```bash
//! tandem-server [--port PORT]
//! ```

use std::env;
use std::process::ExitCode;

use tandem_server::constants::DEFAULT_PORT;
use tandem_server::{AppContext, Gateway, ServerConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn print_usage() {
    eprintln!(
        r#"tandem-server - real-time room synchronization server

USAGE:
    tandem-server [OPTIONS]

OPTIONS:
    --port <PORT>    TCP port to listen on (default: {port})
    --help, -h       Show this help

The protocol is newline-delimited JSON; connect, send a `join` or
`createRoom` message, and go. Logging is controlled with RUST_LOG
(default: info).
"#,
        port = DEFAULT_PORT
    );
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        return run_server(DEFAULT_PORT).await;
    }

    match args[1].as_str() {
        "--help" | "-h" => {
            print_usage();
            ExitCode::SUCCESS
        }
        "--port" => {
            let port = args
                .get(2)
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_PORT);
            run_server(port).await
        }
        arg => {
            // Bare port number also accepted.
            if let Ok(port) = arg.parse::<u16>() {
                return run_server(port).await;
            }
            eprintln!("Unknown argument: {}", arg);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

async fn run_server(port: u16) -> ExitCode {
    tracing::info!("Starting tandem server on port {}...", port);

    let ctx = AppContext::with_defaults(ServerConfig::production(port));
    let gateway = Gateway::new(ctx);

    if let Err(e) = gateway.run().await {
        tracing::error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

use std::io::BufRead;

use clap::{Parser, ValueEnum};
use courier::observability::init_tracing;
use courier::prelude::*;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "courier-server")]
#[command(about = "Topic-based publish/subscribe message server")]
struct Args {
    /// Port to listen on
    port: u16,

    /// Connection scheduling strategy
    #[arg(value_enum)]
    mode: Mode,

    /// Interface to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Reactor worker count (defaults to available parallelism)
    #[arg(long)]
    workers: Option<usize>,

    /// Largest accepted frame in bytes (defaults to 1 MiB)
    #[arg(long)]
    max_frame_size: Option<usize>,

    /// Default log filter when RUST_LOG is unset
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// One task per connection
    Tpc,
    /// Fixed worker pool multiplexing many connections
    Reactor,
}

impl From<Mode> for ServerMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Tpc => ServerMode::ThreadPerConnection,
            Mode::Reactor => ServerMode::Reactor,
        }
    }
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        let defaults = ServerConfig::default();
        ServerConfig {
            bind_addr: format!("{}:{}", self.host, self.port),
            mode: self.mode.into(),
            reactor_workers: self.workers.unwrap_or(defaults.reactor_workers),
            max_frame_size: self
                .max_frame_size
                .unwrap_or(defaults.max_frame_size),
            ..defaults
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CourierError> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let server = CourierServer::builder()
        .config(args.server_config())
        .build(InMemorySessionStore::new())
        .await?;

    // Blocking stdin reads stay off the runtime.
    let store = server.store();
    std::thread::spawn(move || console(&store));
    server.run_until(shutdown_signal()).await?;

    info!("Courier server shut down");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C, shutting down"),
        Err(e) => {
            error!(error = %e, "cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

/// Reads operator commands from stdin until it closes.
fn console(store: &InMemorySessionStore) {
    for line in std::io::stdin().lock().lines() {
        match line {
            Ok(line) => {
                if let Some(output) = run_command(line.trim(), store) {
                    println!("{output}");
                }
            }
            Err(e) => {
                warn!(error = %e, "console input failed");
                break;
            }
        }
    }
}

/// Executes one console command, returning what to print.
fn run_command(line: &str, store: &InMemorySessionStore) -> Option<String> {
    match line {
        "" => None,
        "report" => Some(store.report().to_string()),
        "report json" => match store.report().to_json() {
            Ok(json) => Some(json),
            Err(e) => {
                warn!(error = %e, "failed to render report");
                None
            }
        },
        other => Some(format!(
            "unknown command '{other}'; try 'report' or 'report json'"
        )),
    }
}

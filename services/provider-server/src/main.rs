//! # awsext Provider
//!
//! Host-facing provider process. Logs go to stderr; stdout carries only the
//! handshake line.

use clap::Parser;
use provider_server::{app, handshake_line, BackendKind, ProviderState};
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "awsext-provider")]
#[command(about = "awsext provider - Amazon Connect agent statuses")]
#[command(version = awsext_core::VERSION)]
struct Args {
    /// Address to listen on; port 0 picks a free port
    #[arg(long, env = "AWSEXT_LISTEN", default_value = "127.0.0.1:0")]
    listen: SocketAddr,

    #[arg(long, value_enum, default_value_t = BackendKind::Aws)]
    backend: BackendKind,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    info!("Starting awsext provider {}", awsext_core::BUILD_INFO);

    let state = Arc::new(ProviderState::new(args.backend));
    let listener = TcpListener::bind(args.listen).await?;
    let addr = listener.local_addr()?;
    info!(backend = ?args.backend, "awsext provider listening on {}", addr);

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", handshake_line(&addr))?;
    stdout.flush()?;
    drop(stdout);

    axum::serve(listener, app(state)).await?;

    Ok(())
}

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wordwave::app::{self, Settings};
use wordwave::config::BackendKind;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Path to data directory
    #[arg(short, long, env = "WORDWAVE_DATA_DIR", default_value = "./data")]
    data_dir: String,

    /// Where books, readers and orders live
    #[arg(short, long, env = "WORDWAVE_BACKEND", value_enum, default_value_t = BackendKind::Local)]
    backend: BackendKind,

    /// Minutes a session may sit idle before it is dropped
    #[arg(long, env = "WORDWAVE_SESSION_TTL", default_value_t = 60)]
    session_ttl: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "wordwave=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    tracing::info!("Starting WordWave on port {}", args.port);

    app::run(Settings {
        port: args.port,
        data_dir: args.data_dir,
        backend: args.backend,
        session_ttl: Duration::from_secs(args.session_ttl.max(1) * 60),
    })
    .await
}

use clap::Parser;
use mockmail_core::{Assistant, MockMailConfig};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "mockmail.toml")]
    config: String,

    /// Override `http.port` from the config file
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience - production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut config = match MockMailConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };
    if let Some(port) = args.port {
        config.http.port = port;
    }

    // Init logging - RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    let assistant = match Assistant::from_config(&config) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Failed to initialise assistant clients: {}", e);
            std::process::exit(1);
        }
    };

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    mockmail_server::http::start_http_server(assistant, config, tx.subscribe()).await?;

    Ok(())
}

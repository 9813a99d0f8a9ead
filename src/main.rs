use clap::Parser;
use gemini_proxy::{build_router, AppState, ProxyConfig, SharedLogger};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "gemini-proxy",
    about = "Gemini API proxy — translate generateContent calls to any OpenAI-compatible provider",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Target model (overrides config)
    #[arg(long)]
    model: Option<String>,

    /// Log file path
    #[arg(long, default_value = "gemini-proxy.log")]
    log_file: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gemini_proxy=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = ProxyConfig::find_and_load(cli.config.as_deref())?;

    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(model) = cli.model {
        config.model = model;
    }

    // Validate config eagerly: a missing API key must fail before serving
    let _api_key = config.resolve_api_key()?;

    let logger = SharedLogger::new(&cli.log_file)?;

    info!("gemini-proxy v{}", env!("CARGO_PKG_VERSION"));
    info!("  Target:    {} ({})", config.base_url, config.model);
    info!("  Port:      {}", config.port);
    info!("  Timeout:   {}s", config.timeout_secs);
    info!("  Log file:  {}", cli.log_file.display());

    logger.info(
        "startup",
        format!(
            "Starting gemini-proxy base_url={} model={} port={}",
            config.base_url, config.model, config.port
        ),
    );

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout_secs))
        .build()?;

    let bind_addr = format!("127.0.0.1:{}", config.port);

    let state = Arc::new(AppState {
        config,
        client,
        logger: logger.clone(),
    });

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);
    info!("Health check: http://{}/health", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    logger.info("shutdown", "Proxy server stopped");
    info!("Proxy server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutting down proxy server...");
}

use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/etc/ingestd/ingestd.yml"));

    let config = match ingestd::config::load_config_from_path(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("FATAL: failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    let level = std::env::var("RUST_LOG")
        .or_else(|_| std::env::var("LOG_LEVEL"))
        .unwrap_or_else(|_| config.log.level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .init();

    if let Err(e) = ingestd::supervisor::run(config).await {
        tracing::error!(error = %e, "fatal startup error");
        std::process::exit(1);
    }
}

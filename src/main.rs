use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let http_port = std::env::var("SAWARI_HTTP_PORT").unwrap_or_else(|_| "7878".to_string());
    let db_name = std::env::var("SAWARI_DB_NAME").unwrap_or_else(|_| "sawari".to_string());
    let fail_open = std::env::var("SAWARI_GATE_FAIL_OPEN").unwrap_or_else(|_| "true".to_string());
    info!(
        target: "sawari",
        "sawari starting: RUST_LOG='{}', http_port={}, db_name='{}', gate_fail_open={}",
        rust_log, http_port, db_name, fail_open
    );

    sawari::server::run().await
}

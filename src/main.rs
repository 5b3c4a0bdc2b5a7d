use order_intake::config::Config;
use order_intake::server::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        request_timeout_secs = config.request_timeout.as_secs(),
        max_body = config.max_body,
        "Starting order-intake server"
    );

    // One cooperative scheduler: the worker cycle and the deadline timer
    // interleave on a single thread
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let server = Server::bind(config).await?;
        server.run().await
    })?;

    Ok(())
}

use alert_feed::{Args, config, feed::AlertFeed, http, metrics, signal_handler, source};
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Setup tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Register metrics
    metrics::register_metrics();

    // Parse config
    let args = Args::parse();
    let config = config::Config::from_file(&args.config)?.with_interval(args.interval);

    // Handle signals
    signal_handler()?;

    // Mount the feed; the handle keeps the refresh timer alive until the server stops
    let source = source::from_config(&config.source)?;
    let feed = Arc::new(AlertFeed::new(source, config.feed.preserve_dismissed));
    let handle = feed.mount(config.feed.interval());

    // Start the HTTP server
    let result = http::create_server(config, feed).await;

    handle.shutdown();

    result
}

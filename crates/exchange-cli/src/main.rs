use anyhow::Result;
use clap::Parser;
use exchange_cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so packed text and JSON on stdout stay clean.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    tracing::debug!(?args, "exchange starting");
    exchange_cli::run(args).await
}

use anyhow::Result;
use clap::Parser;
use nc_chunker::cli::{run, Cli};
use nc_chunker::logging::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    // Cloud credentials (AWS_*, GOOGLE_*, AZURE_*) may come from a .env file.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose)?;
    tracing::info!("CLI arguments parsed, invoking run");

    let result = run(cli).await;
    match &result {
        Ok(_) => tracing::info!("CLI completed successfully"),
        Err(e) => tracing::error!(error = %e, "CLI exited with error"),
    }
    result
}

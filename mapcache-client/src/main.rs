//! `mapcache` entry point.

use mapcache_client::cli::write_output;
use mapcache_client::{build_context, init_tracing, ClientConfig, ClientError, Command};

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    let command = Command::parse(std::env::args().skip(1))?;
    let config = ClientConfig::load()?;
    init_tracing(config.log_json)?;

    let ctx = build_context(&config)?;
    tracing::info!(?command, base_url = %config.api_base_url, "Loading");
    let output = command.run(ctx).await?;
    write_output(std::io::stdout().lock(), &output)?;
    Ok(())
}

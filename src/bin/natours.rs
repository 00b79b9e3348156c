use clap::Parser;
use tracing_subscriber::EnvFilter;

use natours_api::cli::utils::output_error;
use natours_api::cli::{Cli, OutputFormat};
use natours_api::config::config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config().default_log_filter())),
        )
        .init();

    let cli = Cli::parse();
    let output_format = OutputFormat::from_cli(&cli);

    if let Err(e) = natours_api::cli::run(cli).await {
        match std::env::var("CLI_VERBOSE").as_deref() {
            Ok("true") | Ok("1") => output_error(output_format, &format!("{e:?}"))?,
            _ => output_error(output_format, &format!("{e:#}"))?,
        }
        std::process::exit(1);
    }

    Ok(())
}

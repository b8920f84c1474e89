//! gremllm - HTML to Markdown through a native converter

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use gremllm_cli::cmd;
use gremllm_cli::{Cli, Commands};
use gremllm_core::GremllmConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = GremllmConfig::from_env().context("Invalid configuration")?;

    init_logging(cli.verbose || config.debug);
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Install {
            release,
            repo,
            api_base,
            dir,
            force,
        } => cmd::install::install(release, repo, api_base, dir, force).await,
        Commands::Platform => cmd::platform::platform(),
        Commands::Locate => cmd::locate::locate(&config),
        Commands::Convert { input, strip } => cmd::convert::convert(&config, &input, &strip),
        Commands::Serve {
            listen,
            internal_base_url,
            default_scheme,
        } => cmd::serve::serve(config, listen, internal_base_url, default_scheme).await,
    }
}

/// `RUST_LOG` wins when set; otherwise `debug` turns on gremllm's own logs.
fn init_logging(debug: bool) {
    let fallback = if debug { "gremllm=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

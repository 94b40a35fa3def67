use anyhow::Context;
use clap::Parser;
use lorebank::cli::{commands, Cli, Commands};
use lorebank::types::config::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Carrega configuração primeiro (ainda sem logging)
    let config = if cli.config.exists() {
        Config::load(&cli.config)
            .with_context(|| format!("failed to load {}", cli.config.display()))?
    } else {
        Config::default_config()
    };

    // Flags da CLI têm precedência sobre a config
    let log_level = if cli.quiet {
        "error".to_string()
    } else if cli.verbose {
        "debug".to_string()
    } else {
        config.general.log_level.clone()
    };

    let filter = EnvFilter::from_default_env().add_directive(
        format!("lorebank={}", log_level)
            .parse()
            .context("invalid log level")?,
    );

    if config.general.log_format == "json" {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }

    tracing::debug!("Configuration loaded from: {}", cli.config.display());

    match cli.command {
        Commands::Init { path } => commands::init(path).await?,
        Commands::Serve { no_learning } => commands::serve(no_learning, &config)
            .await
            .context("server failed")?,
        Commands::Ask {
            query,
            conversation,
            json,
        } => commands::ask(&query, conversation, json, &config).await?,
        Commands::Ingest { input } => commands::ingest(&input, &config)
            .await
            .with_context(|| format!("failed to ingest {}", input.display()))?,
        Commands::Learn => commands::learn(&config).await?,
        Commands::Pending { status, limit } => commands::pending(status, limit, &config).await?,
        Commands::Export { output } => commands::export(&output, &config).await?,
        Commands::Import { input } => commands::import(&input, &config)
            .await
            .with_context(|| format!("failed to import {}", input.display()))?,
        Commands::Status => commands::status(&config).await?,
        Commands::Version => commands::version(),
    }

    Ok(())
}

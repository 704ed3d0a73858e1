//! Pactum CLI - Command-line interface for contract data extraction.

use anyhow::Context;
use clap::Parser;
use pactum_cli::commands;
use pactum_cli::{logging, Cli, Command, Config, Formatter};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::default_path()?,
    };
    let config = Config::load_from(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    logging::init(&config.logging.level, cli.verbose);

    let format = cli
        .format
        .map(Into::into)
        .unwrap_or(config.settings.format);
    let color_enabled = !cli.no_color && config.settings.color;
    let formatter = Formatter::new(format, color_enabled);

    match cli.command {
        Command::Segment(args) => {
            let input = args.input.display().to_string();
            commands::execute_segment(args, &config, &formatter)
                .await
                .with_context(|| format!("failed to segment {}", input))?;
        }
        Command::Extract(args) => {
            let input = args.input.display().to_string();
            commands::execute_extract(args, &config, format, &formatter)
                .await
                .with_context(|| format!("failed to extract from {}", input))?;
        }
        Command::Config(args) => {
            commands::execute_config(args, &config, &config_path, &formatter).await?;
        }
    }

    Ok(())
}

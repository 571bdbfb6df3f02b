// src/main.rs
use clap::Parser;
use ev_scan::cli::Cli;
use ev_scan::config::Config;
use ev_scan::ct_log::{CtLogClient, Scanner};
use ev_scan::run::run_scan;
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();
    cli.validate()?;

    // Load config file, if any
    let config = match cli.config {
        Some(ref path) => Config::from_file(Path::new(path))?,
        None => Config::default(),
    };

    // Initialize logging on stderr; stdout carries results only
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level(&config.logging.level)));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    // Apply CLI overrides and validate before touching the network
    let mut settings = config.scan.clone();
    cli.apply_to(&mut settings);

    let validated = settings.validate(cli.scanner_quiet()).inspect_err(|e| {
        tracing::error!("Invalid configuration: {}", e);
    })?;

    let client = CtLogClient::new(&validated.log_url)?;
    let scanner = Scanner::new(client, validated.scanner.clone());

    let report = run_scan(&validated, &scanner).await?;

    println!("Found {} EV Certs", report.recorded);

    Ok(())
}

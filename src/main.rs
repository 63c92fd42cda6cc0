//! prom2hny - kube-state-metrics to Honeycomb events
//!
//! Scrapes a kube-state-metrics endpoint on an interval and sends one
//! Honeycomb event per Kubernetes object.

use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::info;

use prom2hny::cli::{Cli, OutputFormat};
use prom2hny::collector::ScrapeClient;
use prom2hny::config::{Config, WRITEKEY_ENV};
use prom2hny::runner::Runner;
use prom2hny::sender::{HoneycombSender, JsonLinesSender};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    prom2hny::init_logging(&cli.log_level.to_string(), cli.log_format)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting prom2hny");

    // Load configuration, then layer CLI/env overrides on top
    let mut config = Config::load_or_default(&cli.config)?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    if cli.validate {
        print_config(&config, cli.output_format)?;
        return Ok(());
    }

    let mut client = ScrapeClient::new(&config.source.url, config.source.timeout_ms)?;
    if let Some(token) = &config.source.bearer_token {
        client = client.with_bearer_token(token);
    }
    let interval = Duration::from_secs(config.interval_secs);

    if cli.dry_run {
        let runner = Runner::new(client, JsonLinesSender::stdout(), interval);
        runner.run_once().await?;
        return Ok(());
    }

    let writekey = config.resolve_writekey().ok_or_else(|| {
        anyhow!(
            "No Honeycomb writekey configured; use --writekey, honeycomb.writekey or {}",
            WRITEKEY_ENV
        )
    })?;
    let sender = HoneycombSender::new(&config.honeycomb, &writekey)?;

    info!(
        dataset = %config.honeycomb.dataset,
        endpoint = %sender.endpoint(),
        "Sending events to Honeycomb"
    );

    Runner::new(client, sender, interval).run().await;

    info!("Shutdown complete");
    Ok(())
}

/// Print the effective configuration with secrets masked
fn print_config(config: &Config, format: OutputFormat) -> Result<()> {
    let mut shown = config.clone();
    if shown.honeycomb.writekey.is_some() {
        shown.honeycomb.writekey = Some("********".to_string());
    }
    if shown.source.bearer_token.is_some() {
        shown.source.bearer_token = Some("********".to_string());
    }

    match format {
        OutputFormat::Text => {
            println!("Configuration is valid");
            println!("  source url:     {}", shown.source.url);
            println!("  source timeout: {}ms", shown.source.timeout_ms);
            println!("  api host:       {}", shown.honeycomb.api_host);
            println!("  dataset:        {}", shown.honeycomb.dataset);
            println!("  batch size:     {}", shown.honeycomb.max_batch_size);
            println!("  interval:       {}s", shown.interval_secs);
            println!(
                "  writekey:       {}",
                if config.resolve_writekey().is_some() {
                    "set"
                } else {
                    "missing"
                }
            );
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&shown)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&shown)?),
    }

    Ok(())
}

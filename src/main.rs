use anyhow::{bail, Result};
use arb_translate::cli::Cli;
use arb_translate::client::OpenAiClient;
use arb_translate::config::Config;
use arb_translate::orchestrator::Orchestrator;
use clap::Parser;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("arb_translate=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    // Everything that can fail on bad input happens before the first request
    let mut store = cli.store();
    let base = cli.base_set(&store)?;
    let targets = cli.targets(&mut store)?;
    let options = cli.translate_options(&config);

    info!(
        "Translating {} {} entries into {:?} with {}",
        base.len(),
        base.language(),
        targets,
        options.model
    );

    let client = OpenAiClient::new(reqwest::Client::new(), &config);
    let orchestrator = Orchestrator::new(client, store, options);
    let report = orchestrator.run(&base, &targets).await;
    report.log_summary();

    // Other locales were still processed; report the failures through the exit status
    let failed = report.failed_locales();
    if !failed.is_empty() {
        bail!("Could not write resources for {:?}", failed);
    }

    info!("Updated resource files with new entries.");
    Ok(())
}

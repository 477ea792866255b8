use clap::Parser;
use tokio::runtime::Builder;
use tracing_subscriber::EnvFilter;

use relnotes::cli::{Cli, Commands};
use relnotes::config::{Config, Overrides};
use relnotes::devops::AzureDevOpsClient;
use relnotes::orchestrator::{generate_release_notes, run};
use relnotes::sink::SlackSender;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| cli.log_level().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Every request is awaited before the next one starts; one thread is enough.
    let rt = Builder::new_current_thread().enable_all().build()?;
    rt.block_on(async {
        match cli.command {
            Commands::Notify {
                branch,
                channel,
                dry_run,
            } => {
                let config = Config::load(cli.config.clone(), Overrides { branch, channel }, !dry_run)?;
                tracing::debug!(?config, "Resolved configuration");

                let devops = AzureDevOpsClient::new(&config.azure_devops)?;

                if dry_run {
                    let notes = generate_release_notes(&devops, &config.branch).await?;
                    if !notes.is_empty() {
                        print!("{notes}");
                    }
                    return Ok(());
                }

                let sender = SlackSender::new(&config.slack)?;
                let outcome = run(&devops, &sender, &config.branch, &config.slack.channel).await?;
                tracing::debug!(?outcome, "Run finished");
            }
            Commands::Version { json } => {
                if json {
                    let info = serde_json::json!({
                        "version": env!("CARGO_PKG_VERSION"),
                        "commit": option_env!("GIT_SHA").unwrap_or("unknown"),
                        "build_date": option_env!("BUILD_DATE").unwrap_or("unknown"),
                    });
                    println!("{}", serde_json::to_string_pretty(&info)?);
                } else {
                    println!(
                        "relnotes {} (commit: {}, built: {})",
                        env!("CARGO_PKG_VERSION"),
                        option_env!("GIT_SHA").unwrap_or("unknown"),
                        option_env!("BUILD_DATE").unwrap_or("unknown"),
                    );
                }
            }
        }
        Ok(())
    })
}

use acf_core::{config::Config, server, server::AppState, telemetry};
use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "acf-core", version, about = "IdM Access Configurator")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API and the expiration sweeper (default)
    Serve,
    /// Provision one application's directory objects and print the report
    Apply {
        /// Application name
        application: String,
    },
    /// Expire due temporary access once and print the summary
    Sweep,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    let prometheus_handle = telemetry::init(&config.telemetry)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            info!("Starting ACF Core");
            info!("HTTP server listening on {}", config.http_addr());
            server::run(config, prometheus_handle).await
        }
        Command::Apply { application } => {
            let state = AppState::build(config).await?;
            let report = state.provisioner.apply(&application).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.has_failures() {
                anyhow::bail!(
                    "{} directory operations failed for {}",
                    report.failures().len(),
                    application
                );
            }
            Ok(())
        }
        Command::Sweep => {
            let state = AppState::build(config).await?;
            let summary = state.temporary_access_service.expire_sweep().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
    }
}

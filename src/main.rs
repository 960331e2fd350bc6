use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::ServeParams;

#[derive(Parser)]
#[command(
    name = "racetimer",
    version,
    about = "Lap race coordinator for networked lap timers",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); defaults to the configured format
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the race coordinator HTTP server
    Serve {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Bind address (e.g. 0.0.0.0:5000)
        #[arg(short, long)]
        bind: Option<String>,

        /// Maximum registered participants
        #[arg(long)]
        max_participants: Option<usize>,

        /// Laps per race
        #[arg(long)]
        target_laps: Option<u32>,
    },

    /// Print the effective configuration as TOML
    Config {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            bind,
            max_participants,
            target_laps,
        } => {
            let params = ServeParams {
                config,
                bind,
                max_participants,
                target_laps,
            };
            let config = commands::load_config(params.config.as_ref())?;
            let config = commands::apply_overrides(config, &params)?;

            let format = cli.log_format.as_deref().unwrap_or(&config.logging.format);
            setup_tracing(format, &config.logging.level, cli.verbose)?;

            tracing::info!(
                bind = %config.server.bind_address,
                max_participants = config.race.max_participants,
                target_laps = config.race.target_laps,
                notifications = config.notifications.enabled,
                "Starting serve command"
            );
            if let Err(e) = commands::race_server(config).await {
                tracing::error!(
                    error = %e,
                    category = e.category().as_str(),
                    recoverable = e.is_recoverable(),
                    "Race coordinator failed"
                );
                return Err(e.into());
            }
        }

        Commands::Config { config } => {
            let config = commands::load_config(config.as_ref())?;
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("racetimer=debug,tower_http=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("racetimer={level},warn")))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

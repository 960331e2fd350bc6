use anyhow::{Context, Result};
use std::path::PathBuf;

use racetimer::config::Config;
use racetimer::coordinator::CoordinatorServer;

// ============================================================================
// Race Coordinator Server
// ============================================================================

/// Command-line overrides for the coordinator server
#[derive(Debug, Default)]
pub struct ServeParams {
    pub config: Option<PathBuf>,
    pub bind: Option<String>,
    pub max_participants: Option<usize>,
    pub target_laps: Option<u32>,
}

/// Load the configuration file, or the environment when no file is given
pub fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path),
        None => Config::from_env(),
    }
}

/// Apply command-line overrides on top of a loaded configuration
pub fn apply_overrides(mut config: Config, params: &ServeParams) -> Result<Config> {
    if let Some(bind) = &params.bind {
        config.server = config
            .server
            .with_bind_address_str(bind)
            .context("Invalid bind address")?;
    }
    if let Some(max) = params.max_participants {
        config.race.max_participants = max;
    }
    if let Some(laps) = params.target_laps {
        config.race.target_laps = laps;
    }

    config.validate()?;
    Ok(config)
}

/// Start the race coordinator server
pub async fn race_server(config: Config) -> racetimer::error::Result<()> {
    if let Err(e) = racetimer::metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics disabled");
    }

    let server = CoordinatorServer::new(&config)?;
    let bind_address = config.server.bind_address;

    println!("{}", server.info().await.display());
    println!();
    println!("API Endpoints:");
    println!("  GET  /api/health                          - Health check");
    println!("  GET  /api/v1/metrics                      - Prometheus metrics endpoint");
    println!("  GET  /api/v1/race/state                   - Phase and countdown");
    println!("  GET  /api/v1/race/max-participants        - Get max participants");
    println!("  PUT  /api/v1/race/max-participants/{{n}}    - Set max participants");
    println!("  GET  /api/v1/race/settings                - Get race settings");
    println!("  PUT  /api/v1/race/settings                - Update race settings");
    println!("  POST /api/v1/race/register/{{ip}}           - Register a lap timer");
    println!("  POST /api/v1/race/start                   - Start the start countdown");
    println!("  POST /api/v1/race/finish                  - Start the finish countdown");
    println!("  POST /api/v1/race/countdown/cancel        - Cancel the active countdown");
    println!("  POST /api/v1/race/registration/open       - Reopen registration");
    println!("  POST /api/v1/race/laps                    - Record a lap");
    println!("  GET  /api/v1/race/participants            - Registered participants");
    println!("  GET  /api/v1/race/results                 - All races");
    println!("  GET  /api/v1/race/results/current         - Laps of the current race");
    println!("  GET  /api/v1/race/results/last/{{id}}       - Result of the last race");
    println!();
    println!("Race coordinator listening on http://{bind_address}");
    println!("Press Ctrl+C to stop.\n");

    server
        .start_with_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown signal received");
                }
                Err(e) => {
                    tracing::error!("Failed to wait for Ctrl+C: {}", e);
                }
            }
        })
        .await?;

    println!("Race coordinator stopped.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_overrides() {
        let params = ServeParams {
            bind: Some("127.0.0.1:8080".to_string()),
            max_participants: Some(4),
            target_laps: Some(3),
            ..Default::default()
        };

        let config = apply_overrides(Config::default(), &params).unwrap();
        assert_eq!(config.server.bind_address.port(), 8080);
        assert_eq!(config.race.max_participants, 4);
        assert_eq!(config.race.target_laps, 3);
    }

    #[test]
    fn test_invalid_overrides() {
        let bad_bind = ServeParams {
            bind: Some("not-an-address".to_string()),
            ..Default::default()
        };
        assert!(apply_overrides(Config::default(), &bad_bind).is_err());

        let zero_laps = ServeParams {
            target_laps: Some(0),
            ..Default::default()
        };
        assert!(apply_overrides(Config::default(), &zero_laps).is_err());
    }
}
